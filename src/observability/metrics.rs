//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rshd_admitted_total` (counter): connections admitted to a pre-auth slot
//! - `rshd_rejected_total` (counter): admissions refused, by reason
//! - `rshd_accept_errors_total` (counter): failed accepts
//! - `rshd_spawn_errors_total` (counter): failed session launches
//! - `rshd_trigger_records_total` (counter): control datagrams, by outcome
//! - `rshd_provisioned_listeners_total` (counter): listeners added at runtime
//!
//! # Design Decisions
//! - Low-overhead updates (atomic increments behind the `metrics` facade)
//! - Exposition via a Prometheus scrape endpoint, enabled by config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter. Must run inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, "Failed to install metrics exporter");
        return;
    }
    tracing::info!(address = %addr, "Metrics endpoint started");
}

pub fn record_admitted() {
    metrics::counter!("rshd_admitted_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("rshd_rejected_total", "reason" => reason).increment(1);
}

pub fn record_accept_error() {
    metrics::counter!("rshd_accept_errors_total").increment(1);
}

pub fn record_spawn_error() {
    metrics::counter!("rshd_spawn_errors_total").increment(1);
}

pub fn record_trigger(valid: bool) {
    let outcome = if valid { "accepted" } else { "discarded" };
    metrics::counter!("rshd_trigger_records_total", "outcome" => outcome).increment(1);
}

pub fn record_provisioned(count: usize) {
    metrics::counter!("rshd_provisioned_listeners_total").increment(count as u64);
}
