//! Endpoint registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     scan(root) → add(path) for every file, sorted
//!
//! Filesystem notification (watcher.rs):
//!     add(path)    → compile pattern → load unit → append
//!     change(path) → invalidate unit → rebuild → replace in place
//!     remove(path) → invalidate unit → drop
//!     → atomic swap of Arc<Vec<Arc<Endpoint>>>
//!
//! Request:
//!     snapshot() → one consistent Vec for the whole request
//! ```
//!
//! # Design Decisions
//! - Copy-on-write: every mutation builds a new Vec and swaps the pointer
//! - Readers never block; writers are serialized by a mutex
//! - Insertion order is discovery order and decides which route wins
//! - A failed reload keeps the previous endpoint live

pub mod endpoint;
pub mod loader;
pub mod manifest;
pub mod watcher;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::observability::metrics;
use crate::routing::pattern::path_segments;
use crate::routing::{PatternError, RoutePattern};

pub use endpoint::{Endpoint, MethodKey, MethodTable};
pub use loader::{FileLoader, HandlerFactory, LoadError, SourceUnit, UnitLoader};
pub use watcher::{SourceEvent, SourceWatcher};

/// Immutable point-in-time view of all live endpoints.
pub type Snapshot = Arc<Vec<Arc<Endpoint>>>;

/// Error type for registry mutations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{} is outside the watched root {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("no endpoint registered for `{0}`")]
    UnknownSource(String),

    #[error("failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The live set of endpoints.
pub struct Registry {
    root: PathBuf,
    loader: Arc<dyn UnitLoader>,
    endpoints: ArcSwap<Vec<Arc<Endpoint>>>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("root", &self.root)
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry for files under `root`.
    pub fn new(root: impl Into<PathBuf>, loader: Arc<dyn UnitLoader>) -> Self {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        Self {
            root,
            loader,
            endpoints: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current endpoints; stays valid however the registry changes afterwards.
    pub fn snapshot(&self) -> Snapshot {
        self.endpoints.load_full()
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source keys in registry order.
    pub fn keys(&self) -> Vec<String> {
        self.endpoints
            .load()
            .iter()
            .map(|e| e.source_key().to_string())
            .collect()
    }

    pub fn get(&self, source_key: &str) -> Option<Arc<Endpoint>> {
        self.endpoints
            .load()
            .iter()
            .find(|e| e.source_key() == source_key)
            .cloned()
    }

    /// Register an endpoint that has no backing file (e.g. built-ins).
    pub fn seed(&self, endpoint: Endpoint) {
        let _guard = self.write_lock.lock();
        let key = endpoint.source_key().to_string();
        let endpoint = Arc::new(endpoint);

        self.store(|list| match position(list, &key) {
            Some(i) => list[i] = endpoint,
            None => list.push(endpoint),
        });
        tracing::debug!(source = %key, "Seeded endpoint");
    }

    /// A file appeared. Known keys are reloaded instead of duplicated.
    pub fn add(&self, path: &Path) -> Result<(), RegistryError> {
        let (pattern, unit) = self.unit_for(path)?;
        let _guard = self.write_lock.lock();

        if position(&self.endpoints.load(), &unit.source_key).is_some() {
            tracing::debug!(source = %unit.source_key, "Add for known source; reloading");
            return self.replace_locked(pattern, &unit);
        }

        let endpoint = self.build(pattern, &unit)?;
        let route = endpoint.pattern.display_path();
        self.store(|list| list.push(endpoint));

        tracing::info!(source = %unit.source_key, route = %route, "Endpoint added");
        Ok(())
    }

    /// A file changed. Unknown keys are added, with a warning.
    pub fn change(&self, path: &Path) -> Result<(), RegistryError> {
        let (pattern, unit) = self.unit_for(path)?;
        let _guard = self.write_lock.lock();

        if position(&self.endpoints.load(), &unit.source_key).is_none() {
            tracing::warn!(source = %unit.source_key, "Change for unregistered source; adding it");
            let endpoint = self.build(pattern, &unit)?;
            self.store(|list| list.push(endpoint));
            return Ok(());
        }

        self.replace_locked(pattern, &unit)
    }

    /// A file (or directory) disappeared. Returns how many endpoints were dropped.
    pub fn remove(&self, path: &Path) -> Result<usize, RegistryError> {
        let relative = self.relative(path)?;
        let key = path_segments(&relative).join("/");
        let nested = format!("{key}/");
        let _guard = self.write_lock.lock();

        let removed: Vec<Arc<Endpoint>> = self
            .endpoints
            .load()
            .iter()
            .filter(|e| e.source_key() == key || e.source_key().starts_with(&nested))
            .cloned()
            .collect();

        if removed.is_empty() {
            tracing::warn!(source = %key, "Remove for unregistered source");
            return Err(RegistryError::UnknownSource(key));
        }

        for endpoint in &removed {
            let relative = PathBuf::from(endpoint.source_key());
            let unit = SourceUnit::new(self.root.join(&relative), relative, &endpoint.pattern);
            self.loader.invalidate(&unit);
        }

        self.store(|list| {
            list.retain(|e| e.source_key() != key && !e.source_key().starts_with(&nested))
        });

        tracing::info!(source = %key, removed = removed.len(), "Endpoint removed");
        Ok(removed.len())
    }

    /// Add every file under the root, in sorted order. Returns the number added.
    ///
    /// Files that fail to load are logged and skipped.
    pub fn scan(&self) -> Result<usize, RegistryError> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();

        let mut added = 0;
        for file in files {
            match self.add(&file) {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "Skipping source"),
            }
        }

        tracing::info!(root = %self.root.display(), endpoints = added, "Initial scan complete");
        Ok(added)
    }

    fn replace_locked(&self, pattern: RoutePattern, unit: &SourceUnit) -> Result<(), RegistryError> {
        self.loader.invalidate(unit);
        let endpoint = self.build(pattern, unit)?;

        self.store(|list| match position(list, &unit.source_key) {
            Some(i) => list[i] = endpoint,
            None => list.push(endpoint),
        });

        tracing::info!(source = %unit.source_key, "Endpoint reloaded");
        Ok(())
    }

    fn build(&self, pattern: RoutePattern, unit: &SourceUnit) -> Result<Arc<Endpoint>, RegistryError> {
        let methods = self.loader.load(unit)?;
        Ok(Arc::new(Endpoint::new(pattern, methods)))
    }

    fn unit_for(&self, path: &Path) -> Result<(RoutePattern, SourceUnit), RegistryError> {
        let relative = self.relative(path)?;
        let pattern = RoutePattern::from_relative_path(&relative)?;
        let unit = SourceUnit::new(self.root.join(&relative), relative, &pattern);
        Ok((pattern, unit))
    }

    fn relative(&self, path: &Path) -> Result<PathBuf, RegistryError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        if let Ok(relative) = absolute.strip_prefix(&self.root) {
            return Ok(relative.to_path_buf());
        }

        // The root was canonicalized; the event path may not be.
        std::fs::canonicalize(&absolute)
            .ok()
            .and_then(|p| p.strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .ok_or_else(|| RegistryError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
    }

    fn store(&self, mutate: impl FnOnce(&mut Vec<Arc<Endpoint>>)) {
        let mut next = Vec::clone(&self.endpoints.load());
        mutate(&mut next);
        metrics::set_endpoint_count(next.len());
        self.endpoints.store(Arc::new(next));
    }
}

fn position(list: &[Arc<Endpoint>], source_key: &str) -> Option<usize> {
    list.iter().position(|e| e.source_key() == source_key)
}

/// Hidden files, hidden directories and editor backups never become endpoints.
pub fn is_ignored(relative: &Path) -> bool {
    path_segments(relative)
        .iter()
        .any(|s| s.starts_with('.') || s.ends_with('~'))
}

pub(crate) fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RegistryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = PathBuf::from(entry.file_name());
        if is_ignored(&name) {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, Reply};

    fn registry(dir: &Path) -> Registry {
        Registry::new(dir, Arc::new(FileLoader::new()))
    }

    #[test]
    fn test_add_change_remove() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::write(&file, "one").unwrap();

        let registry = registry(dir.path());
        registry.add(&file).unwrap();
        assert_eq!(registry.keys(), vec!["hello.txt"]);

        let before = registry.snapshot();
        std::fs::write(&file, "two").unwrap();
        registry.change(&file).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!Arc::ptr_eq(&before[0], &registry.snapshot()[0]));
        assert_eq!(before.len(), 1, "old snapshot is untouched");

        assert_eq!(registry.remove(&file).unwrap(), 1);
        assert!(registry.is_empty());
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_change_preserves_position() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let registry = registry(dir.path());
        assert_eq!(registry.scan().unwrap(), 3);

        registry.change(&dir.path().join("b.txt")).unwrap();
        assert_eq!(registry.keys(), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_duplicate_add_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        std::fs::write(&file, "x").unwrap();

        let registry = registry(dir.path());
        registry.add(&file).unwrap();
        registry.add(&file).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_change_unknown_adds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("late.txt");
        std::fs::write(&file, "late").unwrap();

        let registry = registry(dir.path());
        registry.change(&file).unwrap();
        assert_eq!(registry.keys(), vec!["late.txt"]);
    }

    #[test]
    fn test_remove_unknown_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let err = registry.remove(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSource(key) if key == "nope.txt"));
    }

    #[test]
    fn test_remove_directory_drops_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("users/#id")).unwrap();
        std::fs::write(dir.path().join("users/list.txt"), "l").unwrap();
        std::fs::write(dir.path().join("users/#id/posts.txt"), "p").unwrap();
        std::fs::write(dir.path().join("other.txt"), "o").unwrap();

        let registry = registry(dir.path());
        registry.scan().unwrap();
        assert_eq!(registry.len(), 3);

        assert_eq!(registry.remove(&dir.path().join("users")).unwrap(), 2);
        assert_eq!(registry.keys(), vec!["other.txt"]);
    }

    #[test]
    fn test_failed_reload_keeps_old_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.json");
        std::fs::write(&file, r#"{"ok": true}"#).unwrap();

        let registry = registry(dir.path());
        registry.add(&file).unwrap();
        let before = registry.get("data.json").unwrap();

        std::fs::write(&file, "{ broken").unwrap();
        assert!(matches!(registry.change(&file), Err(RegistryError::Load(_))));

        let after = registry.get("data.json").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_scan_skips_hidden_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("a.txt~"), "backup").unwrap();

        let registry = registry(dir.path());
        assert_eq!(registry.scan().unwrap(), 2);
        assert_eq!(registry.keys(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_outside_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("x.txt");
        std::fs::write(&file, "x").unwrap();

        let registry = registry(dir.path());
        assert!(matches!(registry.add(&file), Err(RegistryError::OutsideRoot { .. })));
    }

    #[test]
    fn test_debug_lists_root_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::write(&file, "hi").unwrap();

        let registry = registry(dir.path());
        registry.add(&file).unwrap();

        let debug = format!("{registry:?}");
        assert!(debug.starts_with("Registry"));
        assert!(debug.contains("hello.txt"));
    }

    #[test]
    fn test_seed_replaces_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let pattern = RoutePattern::compile(&["docs"]).unwrap().with_source_key("@docs");

        registry.seed(Endpoint::new(
            pattern.clone(),
            MethodTable::new().with(MethodKey::Get, Handler::fixed(Reply::text("1"))),
        ));
        registry.seed(Endpoint::new(pattern, MethodTable::new()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("@docs").unwrap().methods.is_empty());
    }
}
