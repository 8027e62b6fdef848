//! Application index
//!
//! A snapshot of every launcher file (shortcuts, executables, desktop
//! entries) found under the search and install roots. The snapshot is rebuilt in the background
//! and published with a single atomic swap: readers see either the previous
//! snapshot or the complete new one, and never wait on a build.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use super::scanner::scan_extensions;

/// Launcher extensions collected from search roots
pub const SEARCH_ROOT_EXTENSIONS: &[&str] = &[".lnk", ".exe"];

/// Executable extensions collected from install roots
pub const INSTALL_ROOT_EXTENSIONS: &[&str] = &[".exe"];

/// One discovered launcher file
///
/// Identity is the path; the lowercase name and stem are cached for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    path: PathBuf,
    name: String,
    stem: String,
}

impl AppEntry {
    /// Create an entry for a launcher path
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let name = lower_os(path.file_name());
        let stem = lower_os(path.file_stem());
        Self { path, name, stem }
    }

    /// Absolute path of the launcher
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase file name, e.g. `chrome.exe`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase file name without extension, e.g. `chrome`
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

fn lower_os(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Immutable set of entries, ordered by path
#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    entries: Vec<AppEntry>,
}

impl AppSnapshot {
    /// Build a snapshot from paths, dropping duplicates and sorting by path
    pub fn from_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let unique: BTreeSet<PathBuf> = paths.into_iter().collect();
        Self {
            entries: unique.into_iter().map(AppEntry::new).collect(),
        }
    }

    /// Entries in path order
    #[must_use]
    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Directories and extensions that feed an index build
#[derive(Debug, Clone, Default)]
pub struct IndexRoots {
    /// Directories with shortcuts and documents
    pub search_roots: Vec<PathBuf>,
    /// Directories with installed executables
    pub install_roots: Vec<PathBuf>,
    /// Extensions collected from search roots
    pub search_extensions: Vec<String>,
    /// Extensions collected from install roots
    pub install_extensions: Vec<String>,
}

impl IndexRoots {
    /// Roots with the standard launcher extensions
    #[must_use]
    pub fn new(search_roots: Vec<PathBuf>, install_roots: Vec<PathBuf>) -> Self {
        Self {
            search_roots,
            install_roots,
            search_extensions: SEARCH_ROOT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            install_extensions: INSTALL_ROOT_EXTENSIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Scan every root and collect the launcher files into a snapshot
///
/// Runs synchronously; missing or unreadable roots contribute nothing.
#[must_use]
pub fn build_index(roots: &IndexRoots) -> AppSnapshot {
    let search_ext: Vec<&str> = roots.search_extensions.iter().map(String::as_str).collect();
    let install_ext: Vec<&str> = roots.install_extensions.iter().map(String::as_str).collect();

    let mut paths = Vec::new();
    for root in &roots.search_roots {
        let found = scan_extensions(root, &search_ext);
        tracing::debug!(root = %root.display(), found = found.len(), "indexed search root");
        paths.extend(found);
    }
    for root in &roots.install_roots {
        let found = scan_extensions(root, &install_ext);
        tracing::debug!(root = %root.display(), found = found.len(), "indexed install root");
        paths.extend(found);
    }

    AppSnapshot::from_paths(paths)
}

struct IndexState {
    snapshot: ArcSwap<AppSnapshot>,
    ready: AtomicBool,
    building: AtomicBool,
}

/// Shared handle to the published application index
///
/// Cloning is cheap; all clones see the same snapshot.
#[derive(Clone)]
pub struct AppIndex {
    state: Arc<IndexState>,
}

impl std::fmt::Debug for AppIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIndex")
            .field("ready", &self.is_ready())
            .field("building", &self.is_building())
            .field("entries", &self.snapshot().len())
            .finish()
    }
}

impl Default for AppIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AppIndex {
    /// Create an empty index that is not ready yet
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(IndexState {
                snapshot: ArcSwap::from_pointee(AppSnapshot::default()),
                ready: AtomicBool::new(false),
                building: AtomicBool::new(false),
            }),
        }
    }

    /// Whether a complete build has been published
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire)
    }

    /// Whether a background build is in flight
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.state.building.load(Ordering::Acquire)
    }

    /// The currently published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<AppSnapshot> {
        self.state.snapshot.load_full()
    }

    /// Replace the published snapshot and mark the index ready
    pub fn publish(&self, snapshot: AppSnapshot) {
        let count = snapshot.len();
        self.state.snapshot.store(Arc::new(snapshot));
        self.state.ready.store(true, Ordering::Release);
        tracing::debug!(entries = count, "application index published");
    }

    /// Build a new snapshot on the blocking pool and publish it when done
    ///
    /// Returns `None` without starting anything if a build is already running.
    /// The handle resolves to the number of indexed entries.
    #[must_use = "the handle can be awaited to wait for the build"]
    pub fn spawn_build(&self, roots: IndexRoots) -> Option<JoinHandle<usize>> {
        if self.state.building.swap(true, Ordering::AcqRel) {
            tracing::debug!("application index build already running");
            return None;
        }

        let index = self.clone();
        Some(tokio::task::spawn_blocking(move || {
            let _guard = BuildingGuard(&index.state.building);
            let started = Instant::now();
            tracing::info!(
                search_roots = roots.search_roots.len(),
                install_roots = roots.install_roots.len(),
                "building application index"
            );

            let snapshot = build_index(&roots);
            let count = snapshot.len();
            index.publish(snapshot);

            tracing::info!(
                entries = count,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "application index ready"
            );
            count
        }))
    }
}

/// Clears the building flag even if the build panics
struct BuildingGuard<'a>(&'a AtomicBool);

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
