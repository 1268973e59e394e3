use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path;

use unisync::config::Config;
use unisync::exclusion::IgnoreMatcher;
use unisync::{client, inventory, logging, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("unisync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("2-way directory sync utility")
		.subcommand_required(true)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Debug logging"),
		)
		.subcommand(
			Command::new("sync")
				.about("Sync the directories of a config file")
				.arg(Arg::new("config").required(true).value_name("CONFIG"))
				.arg(
					Arg::new("once")
						.long("once")
						.action(ArgAction::SetTrue)
						.help("Sync once and exit instead of watching"),
				),
		)
		.subcommand(Command::new("serve").about("Serving mode (used internally)"))
		.subcommand(
			Command::new("list")
				.about("Print the inventory of a directory as JSON")
				.arg(Arg::new("dir").required(true))
				.arg(
					Arg::new("ignore")
						.long("ignore")
						.value_name("PATTERN")
						.action(ArgAction::Append)
						.help("Gitignore-style pattern"),
				),
		)
		.get_matches();

	let level = if matches.get_flag("verbose") { "debug" } else { "info" };
	logging::init_tracing(level);

	if matches.subcommand_matches("serve").is_some() {
		serve::serve().await?;
	} else if let Some(sub) = matches.subcommand_matches("sync") {
		let file = sub.get_one::<String>("config").ok_or("sync: config argument required")?;
		let config = Config::load(path::Path::new(file))?;
		client::run(config, sub.get_flag("once")).await?;
	} else if let Some(sub) = matches.subcommand_matches("list") {
		let dir = sub.get_one::<String>("dir").ok_or("list: directory argument required")?;
		let patterns: Vec<String> = sub.get_many::<String>("ignore").map(|v| v.cloned().collect()).unwrap_or_default();
		let matcher = IgnoreMatcher::new(&patterns)?;
		let list = inventory::build(path::Path::new(dir), &matcher)?;
		println!("{}", serde_json::to_string_pretty(&list)?);
	}

	Ok(())
}

// vim: ts=4
