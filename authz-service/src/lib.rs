pub mod config;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod services;

use service_core::axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::{AuthzConfig, ConfigHandle};
use crate::providers::IdentityProvider;

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    /// Current whitelist snapshot; swapped as a whole on reload.
    pub snapshot: ConfigHandle,
    pub provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(config: AuthzConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        let snapshot = ConfigHandle::new(config.snapshot());
        Self {
            config,
            snapshot,
            provider,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/authorize", post(handlers::authorize::authorize))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}

/// Service health check
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider.name(),
    }))
}
