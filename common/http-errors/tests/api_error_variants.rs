use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use eduhub_http_errors::{codes, ApiError};
use uuid::Uuid;

#[test]
fn validation_variant() {
    let mut fields = BTreeMap::new();
    fields.insert("email".to_string(), "invalid_email".to_string());
    let resp = ApiError::validation(fields).into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::VALIDATION);
}

#[test]
fn unauthenticated_variant() {
    let resp = ApiError::Unauthenticated.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::UNAUTHENTICATED);
}

#[test]
fn forbidden_variant() {
    let resp = ApiError::Forbidden.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::FORBIDDEN);
}

#[test]
fn not_found_variant() {
    let resp = ApiError::NotFound { resource: "course" }.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::NOT_FOUND);
}

#[test]
fn conflict_variant() {
    let resp = ApiError::Conflict { field: "enrollment_code" }.into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::CONFLICT);
}

#[test]
fn unprocessable_variant() {
    let resp = ApiError::Unprocessable { reason: "term_already_closed" }.into_response();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::UNPROCESSABLE);
}

#[test]
fn rate_limited_variant() {
    let resp = ApiError::RateLimited { retry_after_secs: 5 }.into_response();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::RATE_LIMITED);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "5");
}

#[test]
fn dependency_unavailable_variant() {
    let resp = ApiError::DependencyUnavailable { dependency: "policy_store" }.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::DEPENDENCY_UNAVAILABLE);
}

#[test]
fn internal_variant() {
    let resp = ApiError::Internal { correlation_id: Uuid::new_v4() }.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), codes::INTERNAL);
}
