//! Declarative handler manifests and static content.
//!
//! A `.toml` or `.json` file whose top level has method keys (any case) or a
//! `default` key is a manifest:
//!
//! ```toml
//! [get]
//! title = "Say hello"
//! reply = { greeting = "hello" }
//! headers = { "cache-control" = "no-cache" }
//!
//! [get.query]
//! schema = { type = "object", required = ["name"] }
//! example = { name = "ada" }
//!
//! [default]
//! reply = "fallback"
//! ```
//!
//! Anything else is served verbatim by an implicit GET handler.

use axum::http::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::handler::{Context, Handler, InputSpec, Reply, ResponseKind, ResponseSpec};
use crate::registry::endpoint::{MethodKey, MethodTable};
use crate::registry::loader::{LoadError, SourceUnit};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HandlerManifest {
    title: Option<String>,
    description: Option<String>,
    body: Option<InputManifest>,
    query: Option<InputManifest>,
    response: Option<ResponseManifest>,
    reply: Option<Value>,
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputManifest {
    schema: Option<Value>,
    example: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseManifest {
    #[serde(rename = "type")]
    kind: ResponseKind,
    schema: Option<Value>,
    example: Option<Value>,
}

/// Build a method table from raw file content.
pub fn table_from_content(unit: &SourceUnit, content: Vec<u8>) -> Result<MethodTable, LoadError> {
    let parse_error = |message: String| LoadError::Parse {
        path: unit.absolute.clone(),
        message,
    };

    match unit.extension().as_deref() {
        Some("json") => {
            let value: Value =
                serde_json::from_slice(&content).map_err(|e| parse_error(e.to_string()))?;
            table_from_value(unit, value)
        }
        Some("toml") => {
            let text = String::from_utf8(content).map_err(|e| parse_error(e.to_string()))?;
            let table: toml::Value = toml::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
            let value = serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))?;
            table_from_value(unit, value)
        }
        _ => {
            let reply = match String::from_utf8(content) {
                Ok(text) => Reply::Text(text),
                Err(e) => Reply::raw(e.into_bytes()),
            };
            Ok(static_table(reply))
        }
    }
}

/// Build a method table from a structured value.
pub fn table_from_value(unit: &SourceUnit, value: Value) -> Result<MethodTable, LoadError> {
    let Value::Object(entries) = value else {
        return Ok(static_table(Reply::from(value)));
    };

    if !entries.keys().any(|k| MethodKey::parse(k).is_some()) {
        return Ok(static_table(Reply::Json(Value::Object(entries))));
    }

    let mut table = MethodTable::new();
    for (name, entry) in entries {
        let Some(key) = MethodKey::parse(&name) else {
            tracing::debug!(source = %unit.source_key, key = %name, "Ignoring non-method key");
            continue;
        };

        let manifest: HandlerManifest =
            serde_json::from_value(entry).map_err(|e| LoadError::Manifest {
                path: unit.absolute.clone(),
                method: key.to_string(),
                message: e.to_string(),
            })?;
        table.insert(key, build_handler(unit, key, manifest)?);
    }

    Ok(table)
}

/// Implicit GET returning the content as loaded.
fn static_table(reply: Reply) -> MethodTable {
    MethodTable::new().with(MethodKey::Get, Handler::fixed(reply))
}

fn build_handler(
    unit: &SourceUnit,
    key: MethodKey,
    manifest: HandlerManifest,
) -> Result<Handler, LoadError> {
    let invalid = |message: String| LoadError::Manifest {
        path: unit.absolute.clone(),
        method: key.to_string(),
        message,
    };

    for (name, value) in &manifest.headers {
        HeaderName::try_from(name.as_str()).map_err(|e| invalid(format!("header `{name}`: {e}")))?;
        HeaderValue::try_from(value.as_str()).map_err(|e| invalid(format!("header `{name}`: {e}")))?;
    }

    let reply = manifest.reply.map(Reply::from).unwrap_or(Reply::NoContent);
    let headers = Arc::new(manifest.headers);

    let mut handler = Handler::new(move |ctx: Context| {
        let reply = reply.clone();
        let headers = headers.clone();
        async move {
            for (name, value) in headers.iter() {
                ctx.set_header(name, value)?;
            }
            Ok::<_, RouteError>(reply)
        }
    });

    if let Some(title) = manifest.title {
        handler = handler.title(title);
    }
    if let Some(description) = manifest.description {
        handler = handler.description(description);
    }
    if let Some(body) = manifest.body {
        handler = handler.body(input_spec(body).map_err(&invalid)?);
    }
    if let Some(query) = manifest.query {
        handler = handler.query(input_spec(query).map_err(&invalid)?);
    }
    if let Some(response) = manifest.response {
        handler = handler.response(ResponseSpec {
            kind: response.kind,
            schema: response.schema,
            example: response.example,
        });
    }

    Ok(handler)
}

fn input_spec(manifest: InputManifest) -> Result<InputSpec, String> {
    let mut spec = match manifest.schema {
        Some(schema) => InputSpec::schema(schema).map_err(|e| e.to_string())?,
        None => InputSpec::default(),
    };
    spec.example = manifest.example;
    Ok(spec)
}
