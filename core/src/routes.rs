//! Ambient endpoints (health, readiness, metrics) plus one illustrative
//! protected route exercising the full chain end to end: identity, tenant
//! binding, permission check, input validation, repository-shaped write,
//! audit pre/post recording, and a hub broadcast. No business-domain
//! schema ships alongside it — this route exists to prove the pipeline
//! wires together, not to model a real resource.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use eduhub_audit::AuditOutcome;
use eduhub_auth::Identity;
use eduhub_http_errors::ApiError;
use eduhub_validate::{Rule, Schema};
use eduhub_wshub::OutboundMessage;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit_scope::AuditScope;
use crate::guard::authorize;
use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Unlike `/healthz` (process is up), this checks that the dependencies a
/// request actually needs are reachable, so a load balancer can take the
/// instance out of rotation before requests start failing against it.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pools.db).await.is_ok();
    if !db_ok {
        return ApiError::DependencyUnavailable { dependency: "database" }.into_response();
    }

    if !state.pools.cache_ok().await {
        return ApiError::DependencyUnavailable { dependency: "cache" }.into_response();
    }

    if !state.permissions.health_check().await {
        return ApiError::DependencyUnavailable { dependency: "policy-store" }.into_response();
    }

    (axum::http::StatusCode::OK, "ready").into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "failed to render metrics");
            ApiError::internal(err).into_response()
        }
    }
}

fn announcement_schema() -> Schema {
    Schema::new()
        .field("title", vec![Rule::Required, Rule::MinLength(1), Rule::MaxLength(200)])
        .field("body", vec![Rule::Required, Rule::MinLength(1), Rule::MaxLength(4000)])
}

/// Posts a tenant-wide announcement: validates the body, records an audit
/// attempt, fans it out over the WebSocket hub to every connection in the
/// tenant, and finalizes the audit entry with the outcome. Grounds
/// `eduhub-validate`, `eduhub-audit`, and `eduhub-wshub` in one call site.
pub async fn post_announcement(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let authorized = authorize(
        &state,
        identity,
        Some(tenant_id),
        &headers,
        "announcement:create",
        "announcement",
    )
    .await?;

    announcement_schema().validate(&body)?;

    let scope = AuditScope::begin(
        &state,
        authorized.tenant.tenant_id,
        &authorized.identity,
        "announcement:create",
        "announcement",
        None,
        None,
    );

    let payload = json!({ "type": "announcement", "title": body["title"], "body": body["body"] });
    state
        .ws_hub
        .broadcast_to_tenant(authorized.tenant.tenant_id, OutboundMessage(payload.to_string()));

    scope.finish(AuditOutcome::Success, Some(body)).await;

    Ok((axum::http::StatusCode::CREATED, Json(json!({ "data": { "status": "sent" } }))).into_response())
}

pub async fn hub_stats(State(state): State<AppState>) -> Json<eduhub_wshub::HubStats> {
    Json(state.ws_hub.stats())
}
