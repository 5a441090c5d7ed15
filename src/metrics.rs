//! Prometheus metrics collection for commsd.
//!
//! Tracks admission decisions, authentication outcomes, and ledger writes.
//! Exposed in text format at `GET /metrics` on the API router.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Successful auth operations by kind (register/login/refresh/logout).
pub static AUTH_OK: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed auth operations by kind and error code.
pub static AUTH_FAILED: OnceLock<IntCounterVec> = OnceLock::new();

/// Admission denials by limiter instance.
pub static RATE_LIMITED: OnceLock<IntCounterVec> = OnceLock::new();

/// Reputation events appended, by event type.
pub static REPUTATION_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Registered users (set at startup, incremented per registration).
pub static REGISTERED_USERS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        AUTH_OK,
        IntCounterVec::new(
            Opts::new("commsd_auth_ok_total", "Successful auth operations by kind"),
            &["op"]
        )
    );
    register!(
        AUTH_FAILED,
        IntCounterVec::new(
            Opts::new("commsd_auth_failed_total", "Failed auth operations by kind and error"),
            &["op", "error"]
        )
    );
    register!(
        RATE_LIMITED,
        IntCounterVec::new(
            Opts::new("commsd_rate_limited_total", "Admission denials by limiter"),
            &["limiter"]
        )
    );
    register!(
        REPUTATION_EVENTS,
        IntCounterVec::new(
            Opts::new("commsd_reputation_events_total", "Reputation events appended by type"),
            &["event_type"]
        )
    );
    register!(
        REGISTERED_USERS,
        IntGauge::new("commsd_registered_users", "Registered users")
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

/// Record a successful auth operation.
#[inline]
pub fn record_auth_ok(op: &str) {
    if let Some(c) = AUTH_OK.get() {
        c.with_label_values(&[op]).inc();
    }
}

/// Record a failed auth operation with its error code.
#[inline]
pub fn record_auth_failed(op: &str, error: &str) {
    if let Some(c) = AUTH_FAILED.get() {
        c.with_label_values(&[op, error]).inc();
    }
}

/// Record an admission denial.
#[inline]
pub fn record_rate_limited(limiter: &str) {
    if let Some(c) = RATE_LIMITED.get() {
        c.with_label_values(&[limiter]).inc();
    }
}

/// Record an appended reputation event.
#[inline]
pub fn record_reputation_event(event_type: &str) {
    if let Some(c) = REPUTATION_EVENTS.get() {
        c.with_label_values(&[event_type]).inc();
    }
}
