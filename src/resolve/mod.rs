//! Fuzzy target resolution
//!
//! Maps a free-text phrase ("chrome", "budget spreadsheet", `~/notes.txt`) to
//! a single local file, shortcut or application.
//!
//! ```text
//! target ──► direct path ──► search roots ──► app index ──► PATH ──► none
//!               (exists)     (patterns +      (fuzzy +
//!                             scanner)         aliases)
//! ```

pub mod alias;
pub mod fuzzy;
pub mod index;
pub mod patterns;
pub mod resolver;
pub mod scanner;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use alias::AliasTable;
pub use fuzzy::{AppMatch, FuzzyMatcher, Scorer, ScorerKind, SkimScorer, WeightedRatio};
pub use index::{AppEntry, AppIndex, AppSnapshot, IndexRoots, build_index};
pub use patterns::{MatchPattern, generate_patterns};
pub use resolver::{TargetResolver, expand_home};
pub use scanner::{scan, scan_extensions};

/// Outcome of resolving a target, tagged with the strategy that found it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ResolvedTarget {
    /// An existing absolute or home-relative path given verbatim
    DirectPath(PathBuf),
    /// A file matched by pattern in a search root
    MatchedFile(PathBuf),
    /// An application found by fuzzy match in the index
    IndexedApp(PathBuf),
    /// An executable found on `PATH`
    PathExecutable(PathBuf),
    /// Nothing matched
    #[serde(rename = "none")]
    NotFound,
}

impl ResolvedTarget {
    /// Short name of the strategy, `none` when nothing matched
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DirectPath(_) => "direct_path",
            Self::MatchedFile(_) => "matched_file",
            Self::IndexedApp(_) => "indexed_app",
            Self::PathExecutable(_) => "path_executable",
            Self::NotFound => "none",
        }
    }

    /// The resolved path, absent only for [`Self::NotFound`]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::DirectPath(p) | Self::MatchedFile(p) | Self::IndexedApp(p) | Self::PathExecutable(p) => {
                Some(p)
            }
            Self::NotFound => None,
        }
    }

    /// Whether a path was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}: {}", self.kind(), path.display()),
            None => f.write_str(self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_target_json() {
        let found = ResolvedTarget::IndexedApp(PathBuf::from("/apps/chrome.exe"));
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            serde_json::json!({"kind": "indexed_app", "path": "/apps/chrome.exe"})
        );
        assert_eq!(
            serde_json::to_value(ResolvedTarget::NotFound).unwrap(),
            serde_json::json!({"kind": "none"})
        );
    }

    #[test]
    fn test_path_absent_only_when_not_found() {
        assert!(ResolvedTarget::NotFound.path().is_none());
        assert!(!ResolvedTarget::NotFound.is_found());
        let direct = ResolvedTarget::DirectPath(PathBuf::from("/tmp"));
        assert_eq!(direct.path(), Some(Path::new("/tmp")));
        assert_eq!(direct.to_string(), "direct_path: /tmp");
    }
}
