use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eduhub_http_errors::panic::PanicRecoveryLayer;
use tower::{Layer, ServiceExt};

fn ok_service() -> impl tower::Service<
    Request<Body>,
    Response = Response,
    Error = std::convert::Infallible,
    Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, std::convert::Infallible>> + Send>>,
> + Clone {
    tower::service_fn(|_req: Request<Body>| {
        Box::pin(async { Ok::<_, std::convert::Infallible>(StatusCode::OK.into_response()) })
            as std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, std::convert::Infallible>> + Send>>
    })
}

fn panicking_service() -> impl tower::Service<
    Request<Body>,
    Response = Response,
    Error = std::convert::Infallible,
    Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, std::convert::Infallible>> + Send>>,
> + Clone {
    tower::service_fn(|_req: Request<Body>| {
        Box::pin(async {
            let result: Result<Response, std::convert::Infallible> = panic!("handler blew up");
            result
        })
            as std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, std::convert::Infallible>> + Send>>
    })
}

#[tokio::test]
async fn passes_through_a_normal_response_untouched() {
    let svc = PanicRecoveryLayer.layer(ok_service());
    let resp = svc.oneshot(Request::new(Body::empty())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn converts_a_panic_into_a_generic_internal_response() {
    let svc = PanicRecoveryLayer.layer(panicking_service());
    let resp = svc.oneshot(Request::new(Body::empty())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "internal");
}
