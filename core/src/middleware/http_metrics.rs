use std::time::Instant;

use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use eduhub_http_errors::ErrorCode;

use crate::state::AppState;

/// Records per-request count, duration, and error counts. Applied with
/// `Router::route_layer` rather than `Router::layer` so `MatchedPath` is
/// available: labeling by the registered route pattern instead of the raw
/// path keeps a tenant id out of the label set.
pub async fn record_http_metrics(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(req).await;

    state.metrics.http_requests_total.with_label_values(&[&method, &route]).inc();
    state.metrics.http_request_duration_seconds.observe(start.elapsed().as_secs_f64());

    if response.status().is_client_error() || response.status().is_server_error() {
        let code = response
            .extensions()
            .get::<ErrorCode>()
            .map(|c| c.0)
            .unwrap_or("unknown");
        let status = response.status().as_str().to_string();
        state.metrics.http_errors_total.with_label_values(&[code, &status]).inc();
    }

    response
}
