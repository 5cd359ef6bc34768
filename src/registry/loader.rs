//! Unit loading: one source file → one method table.
//!
//! # Responsibilities
//! - Resolve a file to Rust-native handler factories when one is registered
//! - Fall back to declarative manifests and static content otherwise
//! - Cache built tables per source key with explicit invalidation
//!
//! # Design Decisions
//! - Factories are keyed by unit key (relative path without extension)
//! - Invalidation drops the cached table; the next load rebuilds from scratch
//! - Loading is synchronous; callers move it off the async executor

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::registry::endpoint::MethodTable;
use crate::registry::manifest;
use crate::routing::RoutePattern;

/// A file as seen by the loader.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Absolute path on disk.
    pub absolute: PathBuf,
    /// Path relative to the watched root.
    pub relative: PathBuf,
    /// Registry key (relative path, `/`-separated, extension kept).
    pub source_key: String,
    /// Factory key (relative path, `/`-separated, extensions stripped).
    pub unit_key: String,
}

impl SourceUnit {
    pub fn new(absolute: PathBuf, relative: PathBuf, pattern: &RoutePattern) -> Self {
        Self {
            absolute,
            relative,
            source_key: pattern.source_key().to_string(),
            unit_key: pattern.unit_key(),
        }
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.relative
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Error type for unit loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid `{method}` handler in {}: {message}", .path.display())]
    Manifest {
        path: PathBuf,
        method: String,
        message: String,
    },

    #[error("handler factory for `{key}` failed: {message}")]
    Factory { key: String, message: String },
}

/// Turns source units into method tables.
pub trait UnitLoader: Send + Sync {
    fn load(&self, unit: &SourceUnit) -> Result<MethodTable, LoadError>;

    /// Forget anything cached for `unit`.
    fn invalidate(&self, _unit: &SourceUnit) {}
}

/// Builds the method table for a unit in Rust code.
pub type HandlerFactory = dyn Fn(&SourceUnit) -> Result<MethodTable, LoadError> + Send + Sync;

/// Default loader: factories first, then manifests, then static content.
#[derive(Default)]
pub struct FileLoader {
    factories: DashMap<String, Arc<HandlerFactory>>,
    cache: DashMap<String, MethodTable>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the unit at `unit_key` (e.g. `users/#id`).
    pub fn register<F>(&self, unit_key: impl Into<String>, factory: F)
    where
        F: Fn(&SourceUnit) -> Result<MethodTable, LoadError> + Send + Sync + 'static,
    {
        self.factories.insert(unit_key.into(), Arc::new(factory));
    }

    /// Builder-style `register`.
    pub fn with_factory<F>(self, unit_key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&SourceUnit) -> Result<MethodTable, LoadError> + Send + Sync + 'static,
    {
        self.register(unit_key, factory);
        self
    }

    /// Number of cached tables.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn build(&self, unit: &SourceUnit) -> Result<MethodTable, LoadError> {
        let factory = self.factories.get(&unit.unit_key).map(|f| f.value().clone());
        if let Some(factory) = factory {
            tracing::debug!(unit = %unit.unit_key, "Building unit from factory");
            return factory(unit);
        }

        let content = std::fs::read(&unit.absolute).map_err(|source| LoadError::Io {
            path: unit.absolute.clone(),
            source,
        })?;
        manifest::table_from_content(unit, content)
    }
}

impl UnitLoader for FileLoader {
    fn load(&self, unit: &SourceUnit) -> Result<MethodTable, LoadError> {
        let cached = self.cache.get(&unit.source_key).map(|t| t.value().clone());
        if let Some(table) = cached {
            return Ok(table);
        }

        let table = self.build(unit)?;
        self.cache.insert(unit.source_key.clone(), table.clone());
        Ok(table)
    }

    fn invalidate(&self, unit: &SourceUnit) {
        if self.cache.remove(&unit.source_key).is_some() {
            tracing::debug!(source = %unit.source_key, "Dropped cached unit");
        }
    }
}
