use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use eduhub_http_errors::ApiError;

use crate::state::AppState;

/// Runs before identity is known, so its key is the connecting IP, not the
/// subject — an unauthenticated burst against
/// `/auth/*` has to be throttled before we've verified anything about the
/// caller. Authenticated routes could additionally key by subject once
/// identity is resolved downstream, but capping by IP here is what stops
/// a credential-stuffing burst before it reaches the verifier at all.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let class = classify(req.uri().path());
    let key = format!("{class}:{}", addr.ip());

    let decision = state.rate_limiter.allow(&key, class);
    if !decision.allowed {
        let retry_after_secs = decision.retry_after.map(|d| d.as_secs().max(1)).unwrap_or(1);
        return ApiError::RateLimited { retry_after_secs }.into_response();
    }

    next.run(req).await
}

fn classify(path: &str) -> &'static str {
    if path.starts_with("/auth") {
        "auth"
    } else if path.starts_with("/ws") {
        "websocket_upgrade"
    } else {
        "api"
    }
}
