//! Reply serialization.
//!
//! # Responsibilities
//! - Map a `Reply` to wire bytes
//! - Pick the default content type for structured and text replies
//! - Let explicit handler headers override defaults
//!
//! # Design Decisions
//! - Raw mode never adds a content type and never re-encodes
//! - `NoContent` produces no frame at all
//! - Header precedence: handler headers applied last

use axum::body::Bytes;
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::handler::Reply;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain";

/// One serialized write: the headers it wants and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Serialize `reply` with the handler's accumulated `headers`.
///
/// Returns `None` when there is nothing to write.
pub fn serialize(reply: Reply, headers: &HeaderMap, raw: bool) -> Option<Frame> {
    if raw {
        let body = match reply {
            Reply::NoContent => return None,
            Reply::Raw(bytes) => bytes,
            Reply::Text(text) => Bytes::from(text),
            Reply::Json(value) => Bytes::from(value.to_string()),
        };
        return Some(Frame {
            headers: headers.clone(),
            body,
        });
    }

    let (default_type, body) = match reply {
        Reply::NoContent => return None,
        Reply::Json(value) => (Some(APPLICATION_JSON), Bytes::from(value.to_string())),
        Reply::Text(text) => (Some(TEXT_PLAIN), Bytes::from(text)),
        Reply::Raw(bytes) => (None, bytes),
    };

    let mut merged = HeaderMap::new();
    if let Some(content_type) = default_type {
        merged.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    for (name, value) in headers {
        merged.insert(name.clone(), value.clone());
    }

    Some(Frame {
        headers: merged,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content_type(frame: &Frame) -> Option<&str> {
        frame.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_json_reply() {
        let frame = serialize(Reply::Json(json!({"a": 1})), &HeaderMap::new(), false).unwrap();

        assert_eq!(content_type(&frame), Some(APPLICATION_JSON));
        assert_eq!(frame.body, Bytes::from_static(br#"{"a":1}"#));
    }

    #[test]
    fn test_text_reply() {
        let frame = serialize(Reply::from(30_i64), &HeaderMap::new(), false).unwrap();

        assert_eq!(content_type(&frame), Some(TEXT_PLAIN));
        assert_eq!(frame.body, Bytes::from_static(b"30"));
    }

    #[test]
    fn test_no_content_writes_nothing() {
        assert!(serialize(Reply::NoContent, &HeaderMap::new(), false).is_none());
        assert!(serialize(Reply::NoContent, &HeaderMap::new(), true).is_none());
    }

    #[test]
    fn test_handler_header_overrides_default() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert("x-extra", HeaderValue::from_static("1"));

        let frame = serialize(Reply::text("<p>hi</p>"), &headers, false).unwrap();

        assert_eq!(content_type(&frame), Some("text/html"));
        assert_eq!(frame.headers.get("x-extra").unwrap(), "1");
    }

    #[test]
    fn test_raw_mode_skips_defaults() {
        let frame = serialize(Reply::text("data: hi\n\n"), &HeaderMap::new(), true).unwrap();

        assert!(frame.headers.is_empty());
        assert_eq!(frame.body, Bytes::from_static(b"data: hi\n\n"));

        let frame = serialize(Reply::Json(json!([1])), &HeaderMap::new(), true).unwrap();
        assert_eq!(frame.body, Bytes::from_static(b"[1]"));
    }

    #[test]
    fn test_raw_reply_outside_raw_mode() {
        let frame = serialize(Reply::raw(vec![1_u8, 2]), &HeaderMap::new(), false).unwrap();

        assert!(content_type(&frame).is_none());
        assert_eq!(frame.body.len(), 2);
    }
}
