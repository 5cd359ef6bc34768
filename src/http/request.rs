//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header
//! - Read the ID back for logging
//!
//! # Design Decisions
//! - IDs come from `tower-http` (`SetRequestIdLayer` with UUID v4) as early as
//!   possible; an ID supplied by the client is kept
//! - The same ID is echoed on the response

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID from `headers`, or `"unknown"` if the layer did not run.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
