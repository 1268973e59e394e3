//! Gitignore-style path exclusion
//!
//! Patterns follow `.gitignore` rules and are matched case-insensitively against
//! slash-separated relative paths:
//!
//! - a trailing `/` restricts the pattern to directories
//! - a pattern containing `/` is anchored at the root (a leading `/` is dropped)
//! - an unanchored pattern matches starting at any component
//! - a match on a directory also covers everything below it
//! - a leading `!` re-includes what an earlier pattern excluded

mod gitignore;

use std::fmt;

use ignore::gitignore::Gitignore;

/// Temporary receive files are never inventoried, watched or transferred
pub const BUILTIN_IGNORES: &[&str] = &[".tmp-unisync-*.tmp"];

/// Errors from pattern compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionError {
	/// Pattern could not be compiled
	InvalidPattern { pattern: String, message: String },
}

impl fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExclusionError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid ignore pattern '{}': {}", pattern, message)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}

/// A compiled set of ignore patterns plus the built-in ones
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
	gitignore: Gitignore,
	sources: Vec<String>,
}

impl Default for IgnoreMatcher {
	fn default() -> Self {
		IgnoreMatcher { gitignore: Gitignore::empty(), sources: Vec::new() }
	}
}

impl IgnoreMatcher {
	/// Compile user patterns. Blank lines and `#` comments are skipped.
	pub fn new(patterns: &[String]) -> Result<Self, ExclusionError> {
		let sources: Vec<String> = BUILTIN_IGNORES
			.iter()
			.map(|p| p.to_string())
			.chain(patterns.iter().cloned())
			.filter(|p| {
				let trimmed = p.trim();
				!trimmed.is_empty() && !trimmed.starts_with('#')
			})
			.collect();
		let gitignore = gitignore::compile(sources.iter().map(|p| p.trim()))?;
		Ok(IgnoreMatcher { gitignore, sources })
	}

	/// True when `path` or a directory above it is excluded
	pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
		gitignore::is_match(&self.gitignore, path, is_dir)
	}

	/// The patterns this matcher was built from, built-ins first
	pub fn sources(&self) -> &[String] {
		&self.sources
	}
}

/// One-shot helper: does `pattern` match `path`? Invalid patterns never match.
pub fn matches(pattern: &str, path: &str, is_dir: bool) -> bool {
	gitignore::compile([pattern]).map(|g| gitignore::is_match(&g, path, is_dir)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builtin_ignores_temp_files() {
		let matcher = IgnoreMatcher::new(&[]).unwrap();
		assert!(matcher.is_ignored(".tmp-unisync-abc123.tmp", false));
		assert!(matcher.is_ignored("dir/.tmp-unisync-x.tmp", false));
		assert!(!matcher.is_ignored("dir/file.tmp", false));
	}

	#[test]
	fn test_comments_and_blank_lines_skipped() {
		let matcher =
			IgnoreMatcher::new(&["# comment".into(), "".into(), "*.o".into()]).unwrap();
		assert_eq!(matcher.sources().len(), BUILTIN_IGNORES.len() + 1);
		assert!(matcher.is_ignored("src/main.o", false));
		assert!(!matcher.is_ignored("# comment", false));
	}

	#[test]
	fn test_any_pattern_matches() {
		let matcher = IgnoreMatcher::new(&[".git/".into(), "/build".into()]).unwrap();
		assert!(matcher.is_ignored(".git", true));
		assert!(matcher.is_ignored(".git/config", false));
		assert!(matcher.is_ignored("build", true));
		assert!(!matcher.is_ignored("src/build", true));
	}

	#[test]
	fn test_negation_reincludes() {
		let matcher = IgnoreMatcher::new(&["*.log".into(), "!keep.log".into()]).unwrap();
		assert!(matcher.is_ignored("debug.log", false));
		assert!(!matcher.is_ignored("keep.log", false));
	}

	#[test]
	fn test_default_ignores_nothing() {
		let matcher = IgnoreMatcher::default();
		assert!(!matcher.is_ignored(".tmp-unisync-abc.tmp", false));
		assert!(matcher.sources().is_empty());
	}
}

// vim: ts=4
