//! Global layers applied to every request: panic recovery and error
//! sanitization live in `eduhub-http-errors`; request id, rate limiting,
//! CORS, and security headers are applied here. Identity, tenant binding,
//! permission checking, and input validation are per-route concerns and
//! live in `crate::guard`, since they need a route's action and resource
//! names, which a global layer cannot know.

pub mod http_metrics;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use http_metrics::record_http_metrics;
pub use rate_limit::enforce_rate_limit;
pub use request_id::assign_request_id;
pub use security_headers::apply_security_headers;
