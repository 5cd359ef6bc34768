//! Request body acquisition and decoding.

use axum::body::{Body, Bytes};
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::error::RouteError;

/// Read the whole body, failing with 413 once `limit` bytes are exceeded.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, RouteError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RouteError::BadRequest(format!("Failed to read body: {e}")))?;
        if buf.len() + chunk.len() > limit {
            return Err(RouteError::new(
                413,
                format!("Request body exceeds {limit} bytes"),
            ));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

/// Decode a payload into a JSON value.
///
/// JSON is attempted when the content type says so or the payload looks like
/// an object or array. Everything else is kept as text; empty is `null`.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<Value, RouteError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let text = String::from_utf8_lossy(bytes);
    let declared = content_type.is_some_and(is_json_media_type);
    let trimmed = text.trim_start();
    let looks_json = trimmed.starts_with('{') || trimmed.starts_with('[');

    if !declared && !looks_json {
        return Ok(Value::String(text.into_owned()));
    }

    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(e) if declared => Err(RouteError::with_metadata(
            400,
            format!("Invalid JSON body: {e}"),
            json!({ "body": text }),
        )),
        Err(_) => Ok(Value::String(text.into_owned())),
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
