//! Shared test utilities

use std::path::{Path, PathBuf};

use jarvis::resolve::{AliasTable, AppIndex, AppSnapshot, FuzzyMatcher, IndexRoots};
use jarvis::TargetResolver;

/// Create an empty file (and its parent folders) under `root`
pub fn touch(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent dirs");
    }
    std::fs::write(&path, b"").expect("failed to create file");
    path
}

/// Resolver over `roots` with an index that is ready with `apps`
#[must_use]
pub fn resolver_with_apps(roots: &[&Path], apps: &[&str]) -> TargetResolver {
    let index = AppIndex::new();
    index.publish(AppSnapshot::from_paths(apps.iter().map(PathBuf::from)));
    resolver_with_index(roots, index)
}

/// Resolver over `roots` sharing `index`
#[must_use]
pub fn resolver_with_index(roots: &[&Path], index: AppIndex) -> TargetResolver {
    let roots: Vec<PathBuf> = roots.iter().map(|r| r.to_path_buf()).collect();
    TargetResolver::from_parts(
        roots.clone(),
        IndexRoots::new(roots, Vec::new()),
        AliasTable::with_defaults(),
        index,
        FuzzyMatcher::default(),
    )
}
