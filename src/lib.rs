//! File-tree HTTP router.
//!
//! Every file under a source root is an endpoint; its relative path is the
//! route and `#name` segments capture path parameters. Files are watched and
//! endpoints are replaced in place while the server keeps running.
//!
//! # Architecture Overview
//!
//! ```text
//!   filesystem events                 client request
//!          │                                │
//!          ▼                                ▼
//!   ┌─────────────┐                 ┌───────────────┐
//!   │   watcher   │                 │  http server  │  request id, trace, CORS
//!   └──────┬──────┘                 └───────┬───────┘
//!          ▼                                ▼
//!   ┌─────────────┐   snapshot      ┌───────────────┐
//!   │  registry   │────────────────▶│   routing     │  first match, DEFAULT
//!   │  (ArcSwap)  │                 │   dispatch    │
//!   └──────┬──────┘                 └───────┬───────┘
//!          ▼                                ▼
//!   ┌─────────────┐                 ┌───────────────┐
//!   │   loader    │                 │   pipeline    │  body, validation
//!   │ factories / │                 └───────┬───────┘
//!   │ manifests / │                         ▼
//!   │ static      │                 ┌───────────────┐
//!   └─────────────┘                 │ handler action│──▶ writer ──▶ client
//!                                   └───────────────┘
//! ```

pub mod config;
pub mod docs;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::RouterConfig;
pub use error::RouteError;
pub use handler::{Context, Handler, Reply};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::{FileLoader, MethodKey, MethodTable, Registry};
