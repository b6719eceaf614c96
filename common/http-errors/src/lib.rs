//! Canonical error envelope and error kinds for the request-servicing core.
//!
//! Every handler in `eduhub-core` returns `Result<T, ApiError>`. `ApiError`
//! is the single place that decides what a client is allowed to see: no
//! raw SQL, file paths, or stack frames ever leave this boundary.

pub mod panic;

use std::collections::BTreeMap;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Stable `code` strings used in the response envelope and in metrics labels.
pub mod codes {
    pub const VALIDATION: &str = "validation";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const UNPROCESSABLE: &str = "unprocessable";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DEPENDENCY_UNAVAILABLE: &str = "dependency_unavailable";
    pub const INTERNAL: &str = "internal";
}

/// The nine canonical error kinds. Each variant carries only what its
/// client-visible message is allowed to contain; anything more detailed is
/// logged via `tracing` at construction time and never placed in a field a
/// client can read.
#[derive(Debug)]
pub enum ApiError {
    /// 400 — field-by-field validation failure. Never echoes submitted values.
    Validation { fields: BTreeMap<String, String> },
    /// 401 — generic message only, regardless of why verification failed.
    Unauthenticated,
    /// 403 — generic message only (tenant binder or permission checker).
    Forbidden,
    /// 404 — names the resource kind but carries no data.
    NotFound { resource: &'static str },
    /// 409 — names the conflicting field.
    Conflict { field: &'static str },
    /// 422 — a closed reason enum, never free text derived from input.
    Unprocessable { reason: &'static str },
    /// 429 — carries the retry hint; `Retry-After` is set from it.
    RateLimited { retry_after_secs: u64 },
    /// 503 — names the dependency only coarsely ("policy_store", "database", ...).
    DependencyUnavailable { dependency: &'static str },
    /// 500 — correlation id only. The real cause is logged server-side.
    Internal { correlation_id: Uuid },
}

impl ApiError {
    pub fn validation(fields: BTreeMap<String, String>) -> Self {
        Self::Validation { fields }
    }

    /// Construct an `internal` error, logging `cause` server-side and
    /// returning only a correlation id to the caller.
    pub fn internal<E: std::fmt::Display>(cause: E) -> Self {
        let correlation_id = Uuid::new_v4();
        tracing::error!(%correlation_id, error = %cause, "internal error");
        Self::Internal { correlation_id }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::VALIDATION,
            ApiError::Unauthenticated => codes::UNAUTHENTICATED,
            ApiError::Forbidden => codes::FORBIDDEN,
            ApiError::NotFound { .. } => codes::NOT_FOUND,
            ApiError::Conflict { .. } => codes::CONFLICT,
            ApiError::Unprocessable { .. } => codes::UNPROCESSABLE,
            ApiError::RateLimited { .. } => codes::RATE_LIMITED,
            ApiError::DependencyUnavailable { .. } => codes::DEPENDENCY_UNAVAILABLE,
            ApiError::Internal { .. } => codes::INTERNAL,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DependencyUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match &self {
            ApiError::Validation { fields } => (
                "one or more fields failed validation".to_string(),
                Some(serde_json::json!({ "fields": fields })),
            ),
            ApiError::Unauthenticated => ("authentication required".to_string(), None),
            ApiError::Forbidden => ("not permitted".to_string(), None),
            ApiError::NotFound { resource } => (format!("{resource} not found"), None),
            ApiError::Conflict { field } => (format!("conflict on field '{field}'"), None),
            ApiError::Unprocessable { reason } => (reason.to_string(), None),
            ApiError::RateLimited { retry_after_secs } => (
                "rate limit exceeded".to_string(),
                Some(serde_json::json!({ "retry_after": retry_after_secs })),
            ),
            ApiError::DependencyUnavailable { dependency } => {
                (format!("{dependency} is currently unavailable"), None)
            }
            ApiError::Internal { correlation_id } => (
                "internal error".to_string(),
                Some(serde_json::json!({ "correlation_id": correlation_id })),
            ),
        };

        let body = ErrorEnvelope {
            error: ErrorBody { code, message, details },
        };

        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert("x-error-code", HeaderValue::from_static(code));
        response.extensions_mut().insert(ErrorCode(code));
        if let ApiError::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Carries the canonical error code into response extensions so a metrics
/// middleware can label by code without re-parsing the JSON body. The code
/// set is closed (nine values), so this never becomes a cardinality problem.
#[derive(Clone, Copy)]
pub struct ErrorCode(pub &'static str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_sets_retry_after_header() {
        let resp = ApiError::RateLimited { retry_after_secs: 3 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(http::header::RETRY_AFTER).unwrap(), "3");
    }

    #[test]
    fn internal_never_leaks_cause_text() {
        let err = ApiError::internal("pq: relation \"users\" does not exist at /src/db.rs:42");
        let resp = err.into_response();
        // The body only ever contains a correlation id, never the cause text.
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_does_not_echo_values() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "must be a valid email".to_string());
        let err = ApiError::validation(fields);
        assert_eq!(err.code(), codes::VALIDATION);
    }

    #[test]
    fn every_error_response_carries_its_canonical_code() {
        let resp = ApiError::Forbidden.into_response();
        assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::FORBIDDEN);
        assert_eq!(resp.extensions().get::<ErrorCode>().unwrap().0, codes::FORBIDDEN);
    }
}
