//! WebSocket upgrade endpoint. An upgrade request carries no body, so it
//! runs identity resolution, origin checking, tenant binding, and the
//! permission check, then hands the connection off to the hub — no
//! input-validation step applies.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header::ORIGIN, HeaderMap};
use axum::response::Response;
use eduhub_auth::Identity;
use eduhub_http_errors::ApiError;
use eduhub_wshub::is_allowed_origin;

use crate::guard::authorize;
use crate::state::AppState;

pub async fn ws_upgrade(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !is_allowed_origin(origin, &state.cors_allowed_origins) {
        return Err(ApiError::Forbidden);
    }

    let authorized = authorize(&state, identity, None, &headers, "websocket:connect", "notification_hub").await?;

    let tenant_id = authorized.tenant.tenant_id;
    let identity_id = authorized.identity.subject;
    let hub = state.ws_hub.clone();

    Ok(ws.on_upgrade(move |socket| eduhub_wshub::handle_connection(socket, hub, tenant_id, identity_id)))
}
