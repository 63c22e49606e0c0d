// Module: http
// HTTP surface of the relay: entry and segment relays plus static endpoints

pub mod error;
pub mod fetch;
pub mod health;
pub mod index;

use axum::Router;
use nekoproxy_core::Config;
use nekoproxy_proxy::{ProxyError, Relay};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    /// Scheme used for relay URLs written into rewritten manifests
    pub public_scheme: Arc<str>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        Ok(Self {
            relay: Arc::new(Relay::new(config)?),
            public_scheme: Arc::from(config.server.public_scheme.as_str()),
        })
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Capability listing
        .merge(index::create_index_router())
        // Health check endpoints (for monitoring probes)
        .merge(health::create_health_router())
        // Relay routes
        .merge(fetch::create_fetch_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
