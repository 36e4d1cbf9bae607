//! Directory walking over the content root.

use super::classify::is_ignored_dir;
use crate::config::SiteConfig;
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files never worth visiting.
const IGNORED_FILES: &[&str] = &[".DS_Store"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Every file under the content directory, in a stable (name-sorted) order.
///
/// Deny-listed and underscore-marked directories are pruned, not just
/// filtered.
pub fn walk_content(config: &SiteConfig) -> Result<Vec<PathBuf>> {
    let root = &config.build.content;
    let deny = &config.build.ignore;
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_ignored_dir(&entry.file_name().to_string_lossy(), deny)
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk `{}`", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if IGNORED_FILES.contains(&name.as_ref()) {
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

/// Content files, optionally restricted to a glob relative to the content
/// directory (`posts/**/*.md`).
pub fn select_content(config: &SiteConfig, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let files = walk_content(config)?;
    let Some(pattern) = pattern else {
        return Ok(files);
    };

    let pattern = Pattern::new(pattern.trim_start_matches('/'))
        .with_context(|| format!("invalid glob `{pattern}`"))?;
    let root = &config.build.content;
    Ok(files
        .into_iter()
        .filter(|file| matches_relative(&pattern, root, file))
        .collect())
}

fn matches_relative(pattern: &Pattern, root: &Path, file: &Path) -> bool {
    file.strip_prefix(root)
        .is_ok_and(|relative| pattern.matches_path_with(relative, MATCH_OPTIONS))
}
