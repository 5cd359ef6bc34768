//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry: built-ins first, then the initial scan
//! - Start the source watcher and its event loop
//!
//! # Design Decisions
//! - Fail fast: a missing source root is fatal
//! - Individual files that fail to load are skipped, not fatal
//! - The watcher starts after the scan, so early events re-apply idempotently

use notify::RecommendedWatcher;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RouterConfig;
use crate::docs;
use crate::lifecycle::shutdown::ShutdownReceiver;
use crate::registry::watcher::apply_events;
use crate::registry::{Registry, RegistryError, SourceWatcher, UnitLoader};

/// Create the registry, seed built-in endpoints and scan the source root.
pub fn build_registry(
    config: &RouterConfig,
    loader: Arc<dyn UnitLoader>,
) -> Result<Arc<Registry>, RegistryError> {
    let registry = Arc::new(Registry::new(&config.source.root, loader));

    if config.docs.enabled {
        for endpoint in docs::endpoints(&config.docs)? {
            registry.seed(endpoint);
        }
        tracing::info!(path = %config.docs.path, "Documentation endpoints enabled");
    }

    registry.scan()?;
    Ok(registry)
}

/// Watch the source root and apply changes until shutdown.
///
/// Returns `None` when watching is disabled. The watcher stops when dropped.
pub fn start_watcher(
    registry: Arc<Registry>,
    config: &RouterConfig,
    shutdown: ShutdownReceiver,
) -> Result<Option<RecommendedWatcher>, notify::Error> {
    if !config.source.watch {
        tracing::info!("Source watching disabled");
        return Ok(None);
    }

    let poll_interval = Duration::from_millis(config.source.poll_interval_ms);
    let (watcher, events) = SourceWatcher::new(registry.root(), poll_interval);
    let handle = watcher.run()?;

    tokio::spawn(apply_events(registry, events, shutdown));
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FileLoader;

    #[test]
    fn test_builtins_precede_scanned_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

        let mut config = RouterConfig::default();
        config.source.root = dir.path().to_path_buf();

        let registry = build_registry(&config, Arc::new(FileLoader::new())).unwrap();
        assert_eq!(
            registry.keys(),
            vec!["@builtin/docs", "@builtin/docs/spec", "hello.txt"]
        );
    }

    #[test]
    fn test_docs_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RouterConfig::default();
        config.source.root = dir.path().to_path_buf();
        config.docs.enabled = false;

        let registry = build_registry(&config, Arc::new(FileLoader::new())).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let mut config = RouterConfig::default();
        config.source.root = "/definitely/not/a/route/tree".into();

        let err = build_registry(&config, Arc::new(FileLoader::new())).unwrap_err();
        assert!(matches!(err, RegistryError::Scan { .. }));
    }
}
