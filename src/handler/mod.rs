//! Handler definitions.
//!
//! # Data Flow
//! ```text
//! source file / factory
//!     → Handler (metadata + constraints + action)
//!     → MethodTable entry inside an Endpoint
//!
//! Per request:
//!     Context (headers, slugs, query, body, writer)
//!     → action(ctx) → Result<Reply, RouteError>
//! ```
//!
//! # Design Decisions
//! - Handlers are immutable; a reload builds a new one
//! - Actions return a closed `Reply` variant instead of arbitrary values
//! - Constraints are trait objects so any validator can be plugged in

pub mod constraint;
pub mod context;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RouteError;

pub use constraint::{Constraint, ConstraintError, JsonSchema};
pub use context::{Context, Query, Slugs};

/// Boxed future returned by an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Reply, RouteError>> + Send + 'static>>;

/// Type-erased action.
pub type ActionFn = dyn Fn(Context) -> ActionFuture + Send + Sync;

/// Result of a handler, decided by variant rather than by inspecting the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Structured data, written as JSON.
    Json(Value),
    /// Primitive or pre-stringified output, written as plain text.
    Text(String),
    /// Bytes written as-is with no default content type.
    Raw(Bytes),
    /// Nothing to write.
    NoContent,
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }

    pub fn raw(value: impl Into<Bytes>) -> Self {
        Reply::Raw(value.into())
    }

    /// Serialize any value into a reply using the same rules as `From<Value>`.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, RouteError> {
        Ok(serde_json::to_value(value)?.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::NoContent)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Reply::NoContent,
            Value::String(s) => Reply::Text(s),
            Value::Number(n) => Reply::Text(n.to_string()),
            Value::Bool(b) => Reply::Text(b.to_string()),
            other => Reply::Json(other),
        }
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Reply::Raw(value)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Reply::Raw(Bytes::from(value))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::NoContent
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Reply::NoContent)
    }
}

macro_rules! reply_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Reply {
            fn from(value: $ty) -> Self {
                Reply::Text(value.to_string())
            }
        })*
    };
}

reply_from_number!(i32, i64, u32, u64, usize, f64);

/// How a handler's replies are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// JSON for structured replies, text for primitives.
    #[default]
    Json,
    /// Bytes as-is, for streams such as server-sent events.
    Raw,
}

/// Declared input: an optional constraint and a documentation example.
#[derive(Clone, Default)]
pub struct InputSpec {
    pub constraint: Option<Arc<dyn Constraint>>,
    pub example: Option<Value>,
}

impl InputSpec {
    /// Input validated by a JSON Schema document.
    pub fn schema(schema: Value) -> Result<Self, ConstraintError> {
        Ok(Self::with(JsonSchema::compile(schema)?))
    }

    pub fn with(constraint: impl Constraint + 'static) -> Self {
        Self {
            constraint: Some(Arc::new(constraint)),
            example: None,
        }
    }

    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Schema document for the docs generator, if the constraint has one.
    pub fn schema_document(&self) -> Option<&Value> {
        self.constraint.as_ref().and_then(|c| c.schema())
    }
}

impl fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSpec")
            .field("constrained", &self.constraint.is_some())
            .field("example", &self.example)
            .finish()
    }
}

/// Declared output shape.
#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    pub kind: ResponseKind,
    pub schema: Option<Value>,
    pub example: Option<Value>,
}

impl ResponseSpec {
    pub fn raw() -> Self {
        Self {
            kind: ResponseKind::Raw,
            ..Self::default()
        }
    }
}

/// Behaviour for one method of one endpoint.
#[derive(Clone)]
pub struct Handler {
    title: Option<String>,
    description: Option<String>,
    body: Option<InputSpec>,
    query: Option<InputSpec>,
    response: Option<ResponseSpec>,
    reads_registry: bool,
    action: Arc<ActionFn>,
}

impl Handler {
    /// Build a handler from an async action.
    pub fn new<F, Fut, R>(action: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RouteError>> + Send + 'static,
        R: Into<Reply>,
    {
        let action: Arc<ActionFn> = Arc::new(move |ctx: Context| -> ActionFuture {
            let fut = action(ctx);
            Box::pin(async move { fut.await.map(Into::into) })
        });

        Self {
            title: None,
            description: None,
            body: None,
            query: None,
            response: None,
            reads_registry: false,
            action,
        }
    }

    /// Handler whose action always returns a clone of `reply`.
    pub fn fixed(reply: Reply) -> Self {
        Self::new(move |_ctx| {
            let reply = reply.clone();
            async move { Ok::<_, RouteError>(reply) }
        })
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn body(mut self, spec: InputSpec) -> Self {
        self.body = Some(spec);
        self
    }

    pub fn query(mut self, spec: InputSpec) -> Self {
        self.query = Some(spec);
        self
    }

    pub fn response(mut self, spec: ResponseSpec) -> Self {
        self.response = Some(spec);
        self
    }

    /// Skip body acquisition and hand the live registry snapshot to the action.
    pub fn reads_registry(mut self) -> Self {
        self.reads_registry = true;
        self
    }

    pub fn title_ref(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description_ref(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn body_spec(&self) -> Option<&InputSpec> {
        self.body.as_ref()
    }

    pub fn query_spec(&self) -> Option<&InputSpec> {
        self.query.as_ref()
    }

    pub fn response_spec(&self) -> Option<&ResponseSpec> {
        self.response.as_ref()
    }

    pub fn wants_registry(&self) -> bool {
        self.reads_registry
    }

    pub fn is_raw(&self) -> bool {
        self.response
            .as_ref()
            .is_some_and(|r| r.kind == ResponseKind::Raw)
    }

    /// Run the action.
    pub fn call(&self, ctx: Context) -> ActionFuture {
        (self.action)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("response", &self.response)
            .field("reads_registry", &self.reads_registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_from_value() {
        assert_eq!(Reply::from(json!(null)), Reply::NoContent);
        assert_eq!(Reply::from(json!("hi")), Reply::Text("hi".into()));
        assert_eq!(Reply::from(json!(30)), Reply::Text("30".into()));
        assert_eq!(Reply::from(json!(true)), Reply::Text("true".into()));
        assert_eq!(Reply::from(json!([1, 2])), Reply::Json(json!([1, 2])));
        assert_eq!(Reply::from(json!({"a": 1})), Reply::Json(json!({"a": 1})));
    }

    #[test]
    fn test_reply_from_primitives() {
        assert_eq!(Reply::from(30_i64), Reply::Text("30".into()));
        assert_eq!(Reply::from(None::<String>), Reply::NoContent);
        assert_eq!(Reply::from(Some("x")), Reply::Text("x".into()));
        assert_eq!(Reply::from(vec![0_u8, 1]), Reply::Raw(Bytes::from_static(&[0, 1])));
        assert!(Reply::from(()).is_empty());
    }

    #[test]
    fn test_handler_builder() {
        let handler = Handler::fixed(Reply::text("ok"))
            .title("Ping")
            .description("Liveness probe")
            .response(ResponseSpec::raw());

        assert_eq!(handler.title_ref(), Some("Ping"));
        assert_eq!(handler.description_ref(), Some("Liveness probe"));
        assert!(handler.is_raw());
        assert!(!handler.wants_registry());
        assert!(handler.body_spec().is_none());
    }

    #[test]
    fn test_response_kind_deserializes_lowercase() {
        let kind: ResponseKind = serde_json::from_value(json!("raw")).unwrap();
        assert_eq!(kind, ResponseKind::Raw);
        assert_eq!(ResponseKind::default(), ResponseKind::Json);
    }
}
