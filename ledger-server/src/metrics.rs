//! Prometheus metrics for the transport adaptor, grounded directly on
//! `ubl-server/src/metrics.rs`'s `lazy_static!` + `prometheus::
//! register_*!` pattern and `/metrics` handler.

use axum::{http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, IntCounterVec, TextEncoder};

lazy_static::lazy_static! {
    /// Total Store operations by RPC name and outcome ("ok"/"error").
    pub static ref LEDGER_OPS: IntCounterVec = prometheus::register_int_counter_vec!(
        "ledger_operations_total",
        "Total ledger operations by RPC name and outcome",
        &["operation", "outcome"]
    ).unwrap();

    /// Total entries appended, by context.
    pub static ref LEDGER_APPENDS: IntCounterVec = prometheus::register_int_counter_vec!(
        "ledger_appends_total",
        "Total entries appended, by context",
        &["context_id"]
    ).unwrap();

    /// Total watch subscriptions opened and closed, by context.
    pub static ref LEDGER_WATCH_EVENTS: IntCounterVec = prometheus::register_int_counter_vec!(
        "ledger_watch_events_total",
        "Total watch subscribe/unsubscribe events by context and kind",
        &["context_id", "kind"]
    ).unwrap();
}

/// GET /metrics - Prometheus exposition endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .expect("failed to encode metrics");

    let body = String::from_utf8(buffer).expect("metrics buffer is not valid UTF-8");

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
