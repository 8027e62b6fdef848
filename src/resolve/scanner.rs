//! Recursive directory scanning
//!
//! Both scans walk the full tree under a root. Missing roots and unreadable
//! subdirectories contribute no hits; they are logged and never fail the scan.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::patterns::MatchPattern;

/// Collect every file under `root` whose basename matches one of `patterns`
///
/// Each file is reported at most once, on its first matching pattern.
/// Output order follows the walk and is not sorted.
#[must_use]
pub fn scan(root: &Path, patterns: &[MatchPattern]) -> Vec<PathBuf> {
    walk_files(root, |name| patterns.iter().any(|p| p.matches(name)))
}

/// Collect every file under `root` whose name ends in one of `extensions`
///
/// Extensions are given with their leading dot and compared case-insensitively.
#[must_use]
pub fn scan_extensions(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    walk_files(root, |name| has_extension(name, extensions))
}

/// Check a file name against a list of dotted extensions, ignoring case
#[must_use]
pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

fn walk_files(root: &Path, mut keep: impl FnMut(&str) -> bool) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "scan root missing, skipping");
        return Vec::new();
    }

    let mut hits = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(
                    path = ?e.path().map(Path::display),
                    error = %e,
                    "skipping unreadable entry"
                );
                continue;
            }
        };

        // Links are not followed into directories, but a link to a file counts
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        if keep(&entry.file_name().to_string_lossy()) {
            hits.push(entry.into_path());
        }
    }

    tracing::trace!(root = %root.display(), hits = hits.len(), "scan complete");
    hits
}
