//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, CORS)
//! - Bind server to listener
//! - Hand every request to the pipeline with a fresh registry snapshot

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    response::Response,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::{LimitsConfig, RouterConfig};
use crate::http::pipeline::handle_request;
use crate::http::request::request_id;
use crate::lifecycle::ShutdownReceiver;
use crate::registry::Registry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub limits: LimitsConfig,
}

/// HTTP server for the router.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving `registry`.
    pub fn new(config: RouterConfig, registry: Arc<Registry>) -> Self {
        let state = AppState {
            registry,
            limits: config.limits.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &RouterConfig, state: AppState) -> Router {
        let mut router = Router::new().fallback(route_request).with_state(state);

        if config.cors.enabled {
            match HeaderValue::from_str(&config.cors.origin) {
                Ok(origin) => {
                    router = router.layer(SetResponseHeaderLayer::if_not_present(
                        header::ACCESS_CONTROL_ALLOW_ORIGIN,
                        origin,
                    ));
                }
                Err(e) => tracing::error!(origin = %config.cors.origin, error = %e, "Invalid CORS origin; header disabled"),
            }
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// A clone of the fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownReceiver,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            cors = self.config.cors.enabled,
            docs = self.config.docs.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// Catch-all handler: every method, every path.
async fn route_request(State(state): State<AppState>, request: Request) -> Response {
    handle_request(state.registry.snapshot(), request, &state.limits).await
}
