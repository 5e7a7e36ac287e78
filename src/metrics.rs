//! Prometheus metrics collection for chato.
//!
//! - `chato_history_operations_total{backend,op}` - history store calls
//! - `chato_history_errors_total{backend,op,code}` - failed history store calls
//! - `chato_history_duration_seconds{backend,op}` - history store latency
//! - `chato_messages_published_total` - messages fanned out to subscribers
//! - `chato_connected_clients` - open gateway connections

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// History store calls by backend and operation.
pub static HISTORY_OPERATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed history store calls by backend, operation and error code.
pub static HISTORY_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// History store latency by backend and operation.
pub static HISTORY_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Messages published to channel subscribers.
pub static MESSAGES_PUBLISHED: OnceLock<IntCounter> = OnceLock::new();

/// Currently open gateway connections.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded; recording
/// before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(
                            error = %e,
                            concat!("Failed to register metric ", stringify!($metric))
                        );
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        concat!("Failed to create metric ", stringify!($metric))
                    );
                }
            }
        };
    }

    register!(HISTORY_OPERATIONS, IntCounterVec::new(
        Opts::new("chato_history_operations_total", "History store calls"),
        &["backend", "op"]));
    register!(HISTORY_ERRORS, IntCounterVec::new(
        Opts::new("chato_history_errors_total", "Failed history store calls"),
        &["backend", "op", "code"]));
    register!(HISTORY_LATENCY, HistogramVec::new(
        HistogramOpts::new("chato_history_duration_seconds", "History store latency")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["backend", "op"]));
    register!(MESSAGES_PUBLISHED, IntCounter::new(
        "chato_messages_published_total", "Messages published to channel subscribers"));
    register!(CONNECTED_CLIENTS, IntGauge::new(
        "chato_connected_clients", "Open gateway connections"));
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

/// Record one history store call and its outcome.
#[inline]
pub fn record_history_op(backend: &str, op: &str, duration_secs: f64, error: Option<&str>) {
    if let Some(c) = HISTORY_OPERATIONS.get() {
        c.with_label_values(&[backend, op]).inc();
    }
    if let Some(h) = HISTORY_LATENCY.get() {
        h.with_label_values(&[backend, op]).observe(duration_secs);
    }
    if let Some(code) = error
        && let Some(c) = HISTORY_ERRORS.get()
    {
        c.with_label_values(&[backend, op, code]).inc();
    }
}

#[inline]
pub fn record_published() {
    if let Some(c) = MESSAGES_PUBLISHED.get() {
        c.inc();
    }
}

#[inline]
pub fn client_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}
