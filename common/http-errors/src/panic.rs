//! Panic recovery: the outermost middleware layer in the request chain.
//!
//! Converts any panic unwinding out of a downstream handler into a generic
//! `internal` response. The full panic payload is logged server-side only;
//! clients receive nothing but a correlation id.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{body::Body, extract::Request, response::{IntoResponse, Response}};
use futures::future::FutureExt;
use tower::{Layer, Service};
use uuid::Uuid;

use crate::ApiError;

#[derive(Clone, Default)]
pub struct PanicRecoveryLayer;

impl<S> Layer<S> for PanicRecoveryLayer {
    type Service = PanicRecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PanicRecoveryService { inner }
    }
}

#[derive(Clone)]
pub struct PanicRecoveryService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for PanicRecoveryService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let result = AssertUnwindSafe(inner.call(req)).catch_unwind().await;
            match result {
                Ok(inner_result) => inner_result,
                Err(panic_payload) => Ok(panic_response(panic_payload)),
            }
        })
    }
}

fn panic_response(payload: Box<dyn Any + Send>) -> Response {
    let message = describe_panic(&payload);
    let correlation_id = Uuid::new_v4();
    tracing::error!(%correlation_id, panic = %message, "recovered from panic in handler");
    ApiError::Internal { correlation_id }.into_response()
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
