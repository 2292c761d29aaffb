//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portico_requests_total` (counter): answered requests by outcome
//! - `portico_connections_total` (counter): accepted connections
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - In-process totals are always kept; the Prometheus endpoint is optional

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection() {
    metrics::counter!("portico_connections_total").increment(1);
}

/// Monotonic request totals.
#[derive(Debug, Default)]
pub struct RequestCounters {
    /// Responses with a status below 400.
    succeeded: AtomicU64,
    /// Responses with a status of 400 or above.
    failed: AtomicU64,
}

/// Point-in-time copy of [`RequestCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub succeeded: u64,
    pub failed: u64,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, successful: bool) {
        let (counter, outcome) = if successful {
            (&self.succeeded, "success")
        } else {
            (&self.failed, "failure")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("portico_requests_total", "outcome" => outcome).increment(1);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            succeeded: self.succeeded(),
            failed: self.failed(),
        }
    }
}
