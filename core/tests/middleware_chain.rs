use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use eduhub_core::middleware::{apply_security_headers, assign_request_id};
use eduhub_http_errors::panic::PanicRecoveryLayer;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn panics() -> impl IntoResponse {
    panic!("boom");
    #[allow(unreachable_code)]
    StatusCode::OK
}

fn app() -> Router {
    Router::new()
        .route("/ok", get(handler))
        .route("/panics", get(panics))
        .layer(axum::middleware::from_fn(apply_security_headers))
        .layer(axum::middleware::from_fn(assign_request_id))
        .layer(PanicRecoveryLayer)
}

#[tokio::test]
async fn security_headers_are_present_on_every_response() {
    let response = app()
        .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert!(response.headers().contains_key("strict-transport-security"));
}

#[tokio::test]
async fn a_request_id_is_assigned_and_echoed() {
    let response = app()
        .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let request_id = response.headers().get("x-request-id").expect("request id header present");
    assert!(uuid::Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn a_panicking_handler_still_gets_security_headers_and_a_generic_body() {
    let response = app()
        .oneshot(Request::builder().uri("/panics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers().get("x-error-code").unwrap(), "internal");
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains("boom"), "panic payload leaked into the response body: {text}");
}
