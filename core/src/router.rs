//! Assembles the full request chain: panic recovery and error sanitization
//! wrap everything, then request id, rate limiting, CORS, and security
//! headers run on every request, before routing to a handler. Metrics are
//! recorded with `route_layer` rather than `layer` so the handler is already
//! matched and `MatchedPath` is available, keeping route labels bounded.
//! Per-route concerns (identity, tenant binding, permission checks,
//! validation) are extractor arguments and `crate::guard::authorize` calls
//! inside each handler, not layers here, since only the handler knows its
//! own action and resource names.

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use eduhub_http_errors::panic::PanicRecoveryLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{apply_security_headers, assign_request_id, enforce_rate_limit, record_http_metrics};
use crate::routes;
use crate::state::AppState;
use crate::ws::ws_upgrade;

pub fn build(state: AppState) -> Router {
    let cors_origins = state.cors_allowed_origins.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin
                .to_str()
                .map(|o| cors_origins.iter().any(|allowed| allowed == o))
                .unwrap_or(false)
        }))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-acting-tenant"),
        ]);

    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        .route("/ws", get(ws_upgrade))
        .route("/api/v1/hub/stats", get(routes::hub_stats))
        .route("/api/v1/tenants/:tenant_id/announcements", post(routes::post_announcement))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), record_http_metrics))
        .layer(axum::middleware::from_fn(apply_security_headers))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(state.clone(), enforce_rate_limit))
        .layer(axum::middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(PanicRecoveryLayer)
        .with_state(state)
}
