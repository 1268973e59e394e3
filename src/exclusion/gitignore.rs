//! Pattern compilation on top of the `ignore` crate's gitignore matcher

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::ExclusionError;

/// Compile gitignore lines into one case-insensitive matcher rooted at the tree root.
///
/// Paths handed to the result are relative, so the root is empty.
pub(super) fn compile<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Gitignore, ExclusionError> {
	let mut builder = GitignoreBuilder::new(Path::new(""));
	builder.case_insensitive(true).map_err(|e| ExclusionError::InvalidPattern {
		pattern: String::new(),
		message: e.to_string(),
	})?;
	for line in lines {
		builder.add_line(None, line).map_err(|e| ExclusionError::InvalidPattern {
			pattern: line.to_string(),
			message: e.to_string(),
		})?;
	}
	builder.build().map_err(|e| ExclusionError::InvalidPattern { pattern: String::new(), message: e.to_string() })
}

/// Match a slash-separated relative path, or any directory above it
pub(super) fn is_match(gitignore: &Gitignore, path: &str, is_dir: bool) -> bool {
	let path = path.trim_start_matches('/');
	if path.is_empty() {
		return false;
	}
	gitignore.matched_path_or_any_parents(path, is_dir).is_ignore()
}


// vim: ts=4
