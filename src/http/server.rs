//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, optional rate limiting)
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - No request-level timeout layer: every outbound operation inside the
//!   pipeline carries its own cap (DNS, dial, total HTTP), and /favicons
//!   must always answer 200 with an image rather than a gateway-style
//!   timeout error

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::handler::{favicon_handler, health_handler, AppState};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterState};

/// Build the router with all middleware layers. Exposed separately so tests
/// can serve it on an ephemeral port.
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    let mut router = Router::new()
        .route("/favicons", get(favicon_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if config.rate_limit.enabled {
        let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));
        router = router.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    router.layer(TraceLayer::new_for_http())
}

/// HTTP server for the favicon service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, state: AppState) -> Self {
        Self {
            router: build_router(config, state),
        }
    }

    /// Run the server, accepting connections on the given listener, until
    /// ctrl-c.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
