//! Built-in documentation endpoints.
//!
//! # Data Flow
//! ```text
//! GET /<docs.path>       → HTML viewer pointing at the spec URL
//! GET /<docs.path>/spec  → registry snapshot → Swagger 2.0 document
//! ```
//!
//! # Design Decisions
//! - Both endpoints are ordinary registry entries seeded ahead of the scan,
//!   so they win over files that would match the same paths
//! - The spec handler receives the live snapshot instead of a request body
//! - DEFAULT handlers are documented under every standard method; explicit
//!   methods override them

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::DocsConfig;
use crate::error::RouteError;
use crate::handler::{Context, Handler, Reply};
use crate::registry::{Endpoint, MethodKey, MethodTable};
use crate::routing::{PatternError, RoutePattern};

const VIEWER_TEMPLATE: &str = include_str!("viewer.html");

/// Source-key prefix for endpoints that have no backing file.
pub const BUILTIN_PREFIX: &str = "@builtin/";

/// Viewer and spec endpoints for `config`, in registration order.
pub fn endpoints(config: &DocsConfig) -> Result<Vec<Endpoint>, PatternError> {
    let path = config.path.trim_matches('/').to_string();
    let spec_url = format!("/{path}/spec");

    let html = VIEWER_TEMPLATE
        .replace("%SWAGGER%", &spec_url)
        .replace("%TITLE%", &config.title);
    let viewer = Handler::new(move |ctx: Context| {
        let html = html.clone();
        async move {
            ctx.set_header("content-type", "text/html; charset=utf-8")?;
            Ok::<_, RouteError>(Reply::Text(html))
        }
    })
    .title("Swagger Document")
    .description("Serves the documentation viewer");

    let title = config.title.clone();
    let spec = Handler::new(move |ctx: Context| {
        let title = title.clone();
        async move {
            let snapshot = ctx
                .registry()
                .cloned()
                .ok_or_else(|| RouteError::internal("registry snapshot unavailable"))?;
            Ok::<_, RouteError>(Reply::Json(swagger_document(&title, &snapshot)))
        }
    })
    .title("Swagger Spec")
    .description("Swagger 2.0 description of every registered endpoint")
    .reads_registry();

    Ok(vec![
        Endpoint::new(
            RoutePattern::compile(&[path.as_str()])?.with_source_key(format!("{BUILTIN_PREFIX}{path}")),
            MethodTable::new().with(MethodKey::Get, viewer),
        ),
        Endpoint::new(
            RoutePattern::compile(&[path.as_str(), "spec"])?
                .with_source_key(format!("{BUILTIN_PREFIX}{path}/spec")),
            MethodTable::new().with(MethodKey::Get, spec),
        ),
    ])
}

/// Describe `endpoints` as a Swagger 2.0 document.
pub fn swagger_document(title: &str, endpoints: &[Arc<Endpoint>]) -> Value {
    let mut paths = Map::new();

    for endpoint in endpoints {
        let mut operations = Map::new();

        if let Some(default) = endpoint.methods.get(MethodKey::Default) {
            for key in MethodKey::STANDARD {
                operations.insert(key.as_str().to_ascii_lowercase(), operation(default, endpoint));
            }
        }
        for (key, handler) in endpoint.methods.iter() {
            if key != MethodKey::Default {
                operations.insert(key.as_str().to_ascii_lowercase(), operation(handler, endpoint));
            }
        }

        paths.insert(endpoint.pattern.template_path(), Value::Object(operations));
    }

    json!({
        "swagger": "2.0",
        "info": {
            "version": env!("CARGO_PKG_VERSION"),
            "title": title,
        },
        "basePath": "/",
        "paths": paths,
    })
}

fn operation(handler: &Handler, endpoint: &Endpoint) -> Value {
    let mut parameters: Vec<Value> = endpoint
        .pattern
        .slug_names()
        .iter()
        .map(|name| json!({ "in": "path", "name": name, "required": true, "type": "string" }))
        .collect();

    if let Some(body) = handler.body_spec() {
        let mut schema = body
            .schema_document()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(example) = &body.example {
            schema.insert("example".into(), example.clone());
        }
        parameters.push(json!({ "in": "body", "name": "body", "schema": schema }));
    }

    if let Some(schema) = handler.query_spec().and_then(|q| q.schema_document()) {
        parameters.extend(query_parameters(schema));
    }

    let mut ok = Map::new();
    ok.insert("description".into(), json!("OK"));
    if let Some(response) = handler.response_spec() {
        if let Some(example) = &response.example {
            ok.insert("examples".into(), json!({ "application/json": example }));
        }
        if let Some(schema) = &response.schema {
            ok.insert("schema".into(), schema.clone());
        }
    }

    let tags: Vec<&String> = endpoint.pattern.logical_segments().iter().take(1).collect();

    json!({
        "summary": handler.title_ref().unwrap_or(endpoint.source_key()),
        "description": handler.description_ref().unwrap_or_default(),
        "parameters": parameters,
        "responses": { "200": ok },
        "tags": tags,
    })
}

/// One query parameter per top-level schema property.
fn query_parameters(schema: &Value) -> Vec<Value> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema["properties"]
        .as_object()
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| {
                    let kind = property["type"].as_str().unwrap_or("string");
                    let mut parameter = json!({
                        "in": "query",
                        "name": name,
                        "required": required.contains(&name.as_str()),
                        "type": kind,
                    });
                    if let Some(description) = property.get("description") {
                        parameter["description"] = description.clone();
                    }
                    parameter
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{InputSpec, ResponseSpec};

    fn endpoint(segments: &[&str], table: MethodTable) -> Arc<Endpoint> {
        Arc::new(Endpoint::new(RoutePattern::compile(segments).unwrap(), table))
    }

    #[test]
    fn test_default_documented_under_every_method() {
        let table = MethodTable::new()
            .with(MethodKey::Default, Handler::fixed(Reply::NoContent).title("any"))
            .with(MethodKey::Post, Handler::fixed(Reply::NoContent).title("create"));
        let doc = swagger_document("t", &[endpoint(&["items"], table)]);

        let ops = doc["paths"]["/items"].as_object().unwrap();
        assert_eq!(ops.len(), MethodKey::STANDARD.len());
        assert_eq!(ops["get"]["summary"], "any");
        assert_eq!(ops["post"]["summary"], "create");
        assert_eq!(doc["swagger"], "2.0");
    }

    #[test]
    fn test_parameters_and_responses() {
        let handler = Handler::fixed(Reply::NoContent)
            .body(
                InputSpec::schema(json!({ "type": "object" }))
                    .unwrap()
                    .example(json!({ "a": 1 })),
            )
            .query(
                InputSpec::schema(json!({
                    "type": "object",
                    "properties": { "page": { "type": "string" } },
                    "required": ["page"]
                }))
                .unwrap(),
            )
            .response(ResponseSpec {
                example: Some(json!({ "ok": true })),
                ..ResponseSpec::default()
            });
        let table = MethodTable::new().with(MethodKey::Put, handler);
        let doc = swagger_document("t", &[endpoint(&["users", "#id"], table)]);

        let op = &doc["paths"]["/users/{id}"]["put"];
        let params = op["parameters"].as_array().unwrap();
        assert_eq!(params[0], json!({ "in": "path", "name": "id", "required": true, "type": "string" }));
        assert_eq!(params[1]["in"], "body");
        assert_eq!(params[1]["schema"]["example"], json!({ "a": 1 }));
        assert_eq!(params[2]["name"], "page");
        assert_eq!(params[2]["required"], true);
        assert_eq!(op["responses"]["200"]["examples"]["application/json"], json!({ "ok": true }));
        assert_eq!(op["tags"], json!(["users"]));
        assert_eq!(op["summary"], "users/#id");
    }

    #[test]
    fn test_builtin_endpoints() {
        let endpoints = endpoints(&DocsConfig::default()).unwrap();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].source_key(), "@builtin/docs");
        assert!(endpoints[0].pattern.is_match("/docs"));
        assert!(!endpoints[0].pattern.is_match("/docs/spec"));
        assert!(endpoints[1].pattern.is_match("/docs/spec"));
        assert!(endpoints[1]
            .methods
            .get(MethodKey::Get)
            .unwrap()
            .wants_registry());
    }
}
