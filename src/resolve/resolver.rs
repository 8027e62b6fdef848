//! Target resolution
//!
//! Turns a spoken phrase into at most one local path. Strategies run in a
//! fixed order and the first success wins:
//!
//! 1. an existing absolute or `~` path
//! 2. a pattern match in the search roots (first root with any hit)
//! 3. a fuzzy match against the application index
//! 4. an executable on `PATH`

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;

use super::alias::AliasTable;
use super::fuzzy::FuzzyMatcher;
use super::index::{AppIndex, IndexRoots};
use super::patterns::generate_patterns;
use super::scanner::{has_extension, scan};
use super::ResolvedTarget;
use crate::config::ResolverConfig;

/// Extensions preferred when a root has several hits
const LAUNCHER_EXTENSIONS: &[&str] = &[".lnk", ".exe"];

/// Characters trimmed from both ends of a target before path checks
const SURROUNDING_QUOTES: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Resolves spoken targets to local files and applications
///
/// Owns its configuration and alias table and shares the application index
/// with whoever builds it. Resolution never fails: anything that goes wrong
/// along the way degrades to [`ResolvedTarget::NotFound`].
#[derive(Debug)]
pub struct TargetResolver {
    search_roots: Vec<PathBuf>,
    index_roots: IndexRoots,
    aliases: AliasTable,
    index: AppIndex,
    matcher: FuzzyMatcher,
}

impl TargetResolver {
    /// Create a resolver from configuration
    ///
    /// Configured aliases are layered over the built-in table.
    #[must_use]
    pub fn new(config: &ResolverConfig, index: AppIndex) -> Self {
        let mut aliases = AliasTable::with_defaults();
        aliases.extend(AliasTable::from_entries(
            config.aliases.iter().map(|(k, v)| (k.as_str(), v.clone())),
        ));

        let matcher = FuzzyMatcher::new(config.scorer.build(), config.threshold);
        Self::from_parts(config.search_roots.clone(), config.index_roots(), aliases, index, matcher)
    }

    /// Create a resolver from explicit parts
    #[must_use]
    pub fn from_parts(
        search_roots: Vec<PathBuf>,
        index_roots: IndexRoots,
        aliases: AliasTable,
        index: AppIndex,
        matcher: FuzzyMatcher,
    ) -> Self {
        Self {
            search_roots,
            index_roots,
            aliases,
            index,
            matcher,
        }
    }

    /// Shared handle to the application index
    #[must_use]
    pub fn index(&self) -> &AppIndex {
        &self.index
    }

    /// Start a background rebuild of the application index
    ///
    /// Returns `None` if a build is already running.
    #[must_use = "the handle can be awaited to wait for the build"]
    pub fn rebuild_index(&self) -> Option<JoinHandle<usize>> {
        self.index.spawn_build(self.index_roots.clone())
    }

    /// Resolve a spoken target, using hints to widen the pattern search
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, target: &str, hints: &[S]) -> ResolvedTarget {
        let t = target.trim().trim_matches(SURROUNDING_QUOTES).trim();

        if let Some(path) = direct_path(t) {
            tracing::debug!(target = t, path = %path.display(), "resolved direct path");
            return ResolvedTarget::DirectPath(path);
        }

        if let Some(path) = self.scan_roots(target, hints) {
            tracing::debug!(target = t, path = %path.display(), "resolved from search roots");
            return ResolvedTarget::MatchedFile(path);
        }

        if let Some(path) = self.matcher.find_best_app(t, &self.index, &self.aliases) {
            tracing::debug!(target = t, path = %path.display(), "resolved from application index");
            return ResolvedTarget::IndexedApp(path);
        }

        if !t.is_empty() {
            match which::which(t) {
                Ok(path) => {
                    tracing::debug!(target = t, path = %path.display(), "resolved on PATH");
                    return ResolvedTarget::PathExecutable(path);
                }
                Err(e) => tracing::trace!(target = t, error = %e, "not on PATH"),
            }
        }

        tracing::debug!(target = t, "target not found");
        ResolvedTarget::NotFound
    }

    /// Scan roots in order and pick the best hit from the first root with any
    fn scan_roots<S: AsRef<str>>(&self, target: &str, hints: &[S]) -> Option<PathBuf> {
        let patterns = generate_patterns(target, hints);
        tracing::trace!(patterns = ?patterns, "scanning search roots");

        self.search_roots.iter().find_map(|root| {
            let hits = scan(root, &patterns);
            if !hits.is_empty() {
                tracing::debug!(root = %root.display(), hits = hits.len(), "search root matched");
            }
            pick_hit(hits)
        })
    }
}

/// Prefer launchers, then the shortest path; path order breaks the rest
fn pick_hit(hits: Vec<PathBuf>) -> Option<PathBuf> {
    hits.into_iter().min_by(|a, b| hit_key(a).cmp(&hit_key(b)))
}

fn hit_key(path: &Path) -> (bool, usize, &Path) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let launcher = has_extension(&name, LAUNCHER_EXTENSIONS);
    (!launcher, path.as_os_str().len(), path)
}

fn direct_path(t: &str) -> Option<PathBuf> {
    if !(t.starts_with('~') || Path::new(t).is_absolute()) {
        return None;
    }
    let path = expand_home(t);
    path.exists().then_some(path)
}

/// Expand a leading `~` to the user's home directory
///
/// Only a bare `~` or `~` followed by a separator is expanded; anything else
/// is returned unchanged.
#[must_use]
pub fn expand_home(s: &str) -> PathBuf {
    let rest = if s == "~" {
        Some("")
    } else {
        s.strip_prefix("~/").or_else(|| s.strip_prefix("~\\"))
    };

    match (rest, directories::BaseDirs::new()) {
        (Some(rest), Some(dirs)) if rest.is_empty() => dirs.home_dir().to_path_buf(),
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(s),
    }
}
