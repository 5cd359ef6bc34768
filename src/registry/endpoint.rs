//! Endpoints and their method tables.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::Handler;
use crate::routing::RoutePattern;

/// Key of a method table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MethodKey {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Fallback for any method without an exact entry.
    Default,
}

impl MethodKey {
    /// Every key that maps to a concrete HTTP method.
    pub const STANDARD: [MethodKey; 7] = [
        MethodKey::Get,
        MethodKey::Post,
        MethodKey::Put,
        MethodKey::Patch,
        MethodKey::Delete,
        MethodKey::Head,
        MethodKey::Options,
    ];

    /// Case-insensitive parse; `default` maps to the fallback key.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(MethodKey::Get),
            "POST" => Some(MethodKey::Post),
            "PUT" => Some(MethodKey::Put),
            "PATCH" => Some(MethodKey::Patch),
            "DELETE" => Some(MethodKey::Delete),
            "HEAD" => Some(MethodKey::Head),
            "OPTIONS" => Some(MethodKey::Options),
            "DEFAULT" => Some(MethodKey::Default),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKey::Get => "GET",
            MethodKey::Post => "POST",
            MethodKey::Put => "PUT",
            MethodKey::Patch => "PATCH",
            MethodKey::Delete => "DELETE",
            MethodKey::Head => "HEAD",
            MethodKey::Options => "OPTIONS",
            MethodKey::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method → handler mapping for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    handlers: BTreeMap<MethodKey, Arc<Handler>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MethodKey, handler: Handler) {
        self.handlers.insert(key, Arc::new(handler));
    }

    /// Builder-style insert.
    pub fn with(mut self, key: MethodKey, handler: Handler) -> Self {
        self.insert(key, handler);
        self
    }

    pub fn get(&self, key: MethodKey) -> Option<&Arc<Handler>> {
        self.handlers.get(&key)
    }

    /// Exact method first, then the DEFAULT fallback.
    pub fn resolve(&self, method: &str) -> Option<(MethodKey, Arc<Handler>)> {
        MethodKey::parse(method)
            .filter(|key| *key != MethodKey::Default)
            .and_then(|key| self.handlers.get(&key).map(|h| (key, h.clone())))
            .or_else(|| {
                self.handlers
                    .get(&MethodKey::Default)
                    .map(|h| (MethodKey::Default, h.clone()))
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = MethodKey> + '_ {
        self.handlers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MethodKey, &Arc<Handler>)> {
        self.handlers.iter().map(|(k, h)| (*k, h))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// A compiled route paired with its handlers.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub pattern: RoutePattern,
    pub methods: MethodTable,
}

impl Endpoint {
    pub fn new(pattern: RoutePattern, methods: MethodTable) -> Self {
        Self { pattern, methods }
    }

    pub fn source_key(&self) -> &str {
        self.pattern.source_key()
    }

    /// Method names in table order, used for 405 responses.
    pub fn available_methods(&self) -> Vec<String> {
        self.methods.keys().map(|k| k.as_str().to_string()).collect()
    }
}
