//! Per-request execution context handed to actions.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FieldViolation, RouteError};
use crate::handler::Reply;
use crate::http::writer::ResponseWriter;
use crate::registry::Snapshot;

/// Slug name → captured value.
pub type Slugs = HashMap<String, String>;

/// Query parameter name → value (last occurrence wins).
pub type Query = HashMap<String, String>;

/// Everything an action may read, plus the capabilities it may use.
#[derive(Clone)]
pub struct Context {
    /// Request headers.
    pub headers: HeaderMap,
    /// Captured slugs.
    pub slugs: Slugs,
    /// Parsed query string.
    pub query: Query,
    /// Decoded request body (`null` when empty).
    pub body: Value,
    registry: Option<Snapshot>,
    writer: Arc<ResponseWriter>,
}

impl Context {
    pub fn new(
        headers: HeaderMap,
        slugs: Slugs,
        query: Query,
        body: Value,
        writer: Arc<ResponseWriter>,
    ) -> Self {
        Self {
            headers,
            slugs,
            query,
            body,
            registry: None,
            writer,
        }
    }

    /// Attach the registry snapshot for handlers that describe the registry.
    pub fn with_registry(mut self, snapshot: Snapshot) -> Self {
        self.registry = Some(snapshot);
        self
    }

    pub fn slug(&self, name: &str) -> Option<&str> {
        self.slugs.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Live registry snapshot, only present for registry-reading handlers.
    pub fn registry(&self) -> Option<&Snapshot> {
        self.registry.as_ref()
    }

    /// Deserialize the body into a typed value.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        serde_json::from_value(self.body.clone()).map_err(|e| RouteError::Validation {
            fields: vec![FieldViolation::new(Vec::new(), e.to_string())],
        })
    }

    /// Deserialize the query map into a typed value.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        let value = serde_json::to_value(&self.query)?;
        serde_json::from_value(value).map_err(|e| RouteError::Validation {
            fields: vec![FieldViolation::new(Vec::new(), e.to_string())],
        })
    }

    /// Set a header for the next write. Later calls for the same key win.
    pub fn set_header(&self, key: &str, value: &str) -> Result<(), RouteError> {
        let name = HeaderName::try_from(key)
            .map_err(|e| RouteError::internal(format!("invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| RouteError::internal(format!("invalid value for header `{key}`: {e}")))?;

        self.writer.set_header(name, value);
        Ok(())
    }

    /// Write `reply` immediately, ahead of the action's return value.
    pub fn send(&self, reply: impl Into<Reply>) {
        self.writer.send(reply.into());
    }
}
