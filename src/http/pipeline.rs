//! Request pipeline: dispatch, input acquisition, validation, invocation.
//!
//! # Responsibilities
//! - Resolve the request against one registry snapshot
//! - Decode the body and query and check them against declared constraints
//! - Run the action on its own task and stream what it writes
//! - Record per-request metrics and a completion log line
//!
//! # Design Decisions
//! - Every failure is a `RouteError` until the boundary, where it becomes an
//!   envelope exactly once
//! - Body and query violations are reported together
//! - The response is returned as soon as the head is committed; later writes
//!   stream behind it
//! - The request timeout bounds the time to the response head, not the stream

use axum::body::Body;
use axum::extract::{Query as QueryExtractor, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use crate::config::LimitsConfig;
use crate::error::{FieldViolation, RouteError};
use crate::handler::{Context, Handler, InputSpec, Query};
use crate::http::body::{decode_body, read_body};
use crate::http::writer::ResponseWriter;
use crate::observability::metrics;
use crate::registry::Snapshot;
use crate::routing::{dispatch, Dispatch};

/// Label used for requests that matched no endpoint.
const UNMATCHED_ROUTE: &str = "none";

/// Handle one request end to end.
pub async fn handle_request(snapshot: Snapshot, request: Request, limits: &LimitsConfig) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    let (route, response) = match dispatch(&snapshot, &method, &path) {
        Ok(dispatched) => {
            let route = dispatched.endpoint.pattern.display_path();
            let (parts, body) = request.into_parts();
            let invocation = invoke(dispatched, parts, body, snapshot, limits.max_body_bytes);
            let result = match limits.request_timeout_secs {
                0 => invocation.await,
                secs => tokio::time::timeout(Duration::from_secs(secs), invocation)
                    .await
                    .unwrap_or_else(|_| Err(RouteError::new(408, "Request timed out"))),
            };
            let response = result.unwrap_or_else(IntoResponse::into_response);
            (route, response)
        }
        Err(err) => (UNMATCHED_ROUTE.to_string(), err.into_response()),
    };

    let status = response.status().as_u16();
    metrics::record_request(&method, status, &route, start);
    tracing::debug!(
        method = %method,
        path = %path,
        route = %route,
        status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

async fn invoke(
    dispatched: Dispatch,
    parts: Parts,
    body: Body,
    snapshot: Snapshot,
    max_body_bytes: usize,
) -> Result<Response, RouteError> {
    let Dispatch { handler, slugs, .. } = dispatched;

    let query = parse_query(&parts)?;
    let body = if handler.wants_registry() {
        Value::Null
    } else {
        let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let bytes = read_body(body, max_body_bytes).await?;
        decode_body(&bytes, content_type)?
    };

    validate(&handler, &body, &query)?;

    let (writer, stream) = ResponseWriter::channel(handler.is_raw());
    let mut ctx = Context::new(parts.headers, slugs, query, body, writer.clone());
    if handler.wants_registry() {
        ctx = ctx.with_registry(snapshot);
    }

    let action = handler.call(ctx);
    tokio::spawn(async move {
        match action.await {
            Ok(reply) => writer.finish(reply),
            Err(err) => {
                tracing::debug!(error = %err, "Handler returned an error");
                writer.fail(&err);
            }
        }
    });

    Ok(stream.into_response().await)
}

fn parse_query(parts: &Parts) -> Result<Query, RouteError> {
    QueryExtractor::<Query>::try_from_uri(&parts.uri)
        .map(|QueryExtractor(query)| query)
        .map_err(|e| RouteError::BadRequest(format!("Invalid query string: {e}")))
}

/// Check body and query against the handler's constraints, collecting every violation.
pub fn validate(handler: &Handler, body: &Value, query: &Query) -> Result<(), RouteError> {
    let mut fields = Vec::new();

    check("body", handler.body_spec(), body, &mut fields);

    if handler.query_spec().is_some() {
        let query: Map<String, Value> = query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        check("query", handler.query_spec(), &Value::Object(query), &mut fields);
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(RouteError::Validation { fields })
    }
}

fn check(location: &str, spec: Option<&InputSpec>, value: &Value, out: &mut Vec<FieldViolation>) {
    let Some(constraint) = spec.and_then(|s| s.constraint.as_ref()) else {
        return;
    };

    if let Err(violations) = constraint.check(value) {
        out.extend(violations.into_iter().map(|mut v| {
            v.path.insert(0, location.to_string());
            v
        }));
    }
}
