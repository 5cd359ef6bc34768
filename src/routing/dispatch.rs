//! Request dispatch against a registry snapshot.
//!
//! # Responsibilities
//! - Find the first endpoint whose matcher accepts the path
//! - Bind captured values to slug names
//! - Resolve the handler for the request method
//!
//! # Design Decisions
//! - Linear scan in registry order; first match wins, no specificity ranking
//! - Returns owned `Arc`s so the request outlives later registry swaps

use std::sync::Arc;

use crate::error::RouteError;
use crate::handler::context::Slugs;
use crate::handler::Handler;
use crate::registry::{Endpoint, MethodKey};

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub endpoint: Arc<Endpoint>,
    pub handler: Arc<Handler>,
    /// Table key that matched (`Default` when the fallback was used).
    pub method: MethodKey,
    pub slugs: Slugs,
}

/// Resolve `method` + `path` (no query string) against `endpoints`.
pub fn dispatch(endpoints: &[Arc<Endpoint>], method: &str, path: &str) -> Result<Dispatch, RouteError> {
    let endpoint = endpoints
        .iter()
        .find(|e| e.pattern.is_match(path))
        .ok_or(RouteError::NotFound)?;

    let captures = endpoint
        .pattern
        .captures(path)
        .filter(|c| c.len() == endpoint.pattern.slug_names().len())
        .ok_or_else(|| RouteError::BadRequest("Bad slugs".to_string()))?;

    let slugs: Slugs = endpoint
        .pattern
        .slug_names()
        .iter()
        .cloned()
        .zip(captures)
        .collect();

    let (key, handler) =
        endpoint
            .methods
            .resolve(method)
            .ok_or_else(|| RouteError::MethodNotAllowed {
                method: method.to_ascii_uppercase(),
                available: endpoint.available_methods(),
            })?;

    tracing::trace!(
        route = %endpoint.pattern.display_path(),
        method = %key,
        "Dispatched request"
    );

    Ok(Dispatch {
        endpoint: endpoint.clone(),
        handler,
        method: key,
        slugs,
    })
}
