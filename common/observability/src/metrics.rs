use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Every Prometheus series the request-servicing core exposes, one gauge or
/// counter per subsystem named in the system overview.
#[derive(Clone)]
pub struct CoreMetrics {
    registry: Registry,

    pub http_requests_total: IntCounterVec,
    pub http_errors_total: IntCounterVec,
    pub http_request_duration_seconds: Histogram,

    pub rate_limit_checks_total: IntCounterVec,
    pub rate_limit_rejections_total: IntCounterVec,
    pub rate_limit_buckets_resident: IntGauge,
    pub rate_limit_sweep_duration_seconds: Histogram,

    pub ws_connections_current: IntGaugeVec,
    pub ws_messages_dropped_total: IntCounter,
    pub ws_connections_closed_slow_total: IntCounter,

    pub audit_writes_total: IntCounterVec,
    pub audit_write_failures_total: IntCounter,
    pub audit_entries_retained: IntGauge,

    pub permission_cache_hits_total: IntCounter,
    pub permission_cache_misses_total: IntCounter,
}

impl CoreMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests handled"),
            &["method", "route"],
        )
        .unwrap();
        let http_errors_total = IntCounterVec::new(
            Opts::new("http_errors_total", "Count of HTTP error responses (status >= 400)"),
            &["code", "status"],
        )
        .unwrap();
        let http_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "End-to-end request handling time",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )
        .unwrap();

        let rate_limit_checks_total = IntCounterVec::new(
            Opts::new("rate_limit_checks_total", "Total Allow() calls"),
            &["class"],
        )
        .unwrap();
        let rate_limit_rejections_total = IntCounterVec::new(
            Opts::new("rate_limit_rejections_total", "Total Allow() calls that were denied"),
            &["class"],
        )
        .unwrap();
        let rate_limit_buckets_resident = IntGauge::new(
            "rate_limit_buckets_resident",
            "Number of token buckets currently resident in the limiter registry",
        )
        .unwrap();
        let rate_limit_sweep_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "rate_limit_sweep_duration_seconds",
            "Duration of one sweeper pass over the bucket registry",
        ))
        .unwrap();

        let ws_connections_current = IntGaugeVec::new(
            Opts::new("ws_connections_current", "Currently registered WebSocket connections"),
            &["tenant_id"],
        )
        .unwrap();
        let ws_messages_dropped_total = IntCounter::new(
            "ws_messages_dropped_total",
            "Outbound messages dropped due to a full per-connection queue",
        )
        .unwrap();
        let ws_connections_closed_slow_total = IntCounter::new(
            "ws_connections_closed_slow_total",
            "Connections closed for exceeding the consecutive-drop threshold",
        )
        .unwrap();

        let audit_writes_total = IntCounterVec::new(
            Opts::new("audit_writes_total", "Audit entries written"),
            &["outcome"],
        )
        .unwrap();
        let audit_write_failures_total = IntCounter::new(
            "audit_write_failures_total",
            "Audit writes that failed (availability preferred over durability)",
        )
        .unwrap();
        let audit_entries_retained = IntGauge::new(
            "audit_entries_retained",
            "Entries remaining after the last retention sweep",
        )
        .unwrap();

        let permission_cache_hits_total = IntCounter::new(
            "permission_cache_hits_total",
            "Permission checks served from cache",
        )
        .unwrap();
        let permission_cache_misses_total = IntCounter::new(
            "permission_cache_misses_total",
            "Permission checks that required a policy store round trip",
        )
        .unwrap();

        for collector in [
            Box::new(http_requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(http_errors_total.clone()),
            Box::new(http_request_duration_seconds.clone()),
            Box::new(rate_limit_checks_total.clone()),
            Box::new(rate_limit_rejections_total.clone()),
            Box::new(rate_limit_buckets_resident.clone()),
            Box::new(rate_limit_sweep_duration_seconds.clone()),
            Box::new(ws_connections_current.clone()),
            Box::new(ws_messages_dropped_total.clone()),
            Box::new(ws_connections_closed_slow_total.clone()),
            Box::new(audit_writes_total.clone()),
            Box::new(audit_write_failures_total.clone()),
            Box::new(audit_entries_retained.clone()),
            Box::new(permission_cache_hits_total.clone()),
            Box::new(permission_cache_misses_total.clone()),
        ] {
            let _ = registry.register(collector);
        }

        Self {
            registry,
            http_requests_total,
            http_errors_total,
            http_request_duration_seconds,
            rate_limit_checks_total,
            rate_limit_rejections_total,
            rate_limit_buckets_resident,
            rate_limit_sweep_duration_seconds,
            ws_connections_current,
            ws_messages_dropped_total,
            ws_connections_closed_slow_total,
            audit_writes_total,
            audit_write_failures_total,
            audit_entries_retained,
            permission_cache_hits_total,
            permission_cache_misses_total,
        }
    }

    /// Render the registry in Prometheus text exposition format for `/metrics`.
    pub fn render(&self) -> anyhow::Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"))
            .body(Body::from(buffer))?)
    }
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}
