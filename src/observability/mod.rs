//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine produces:
//!     → events.rs (one event per answered request, faults, transport errors)
//!     → metrics.rs (success/failure totals, connection count)
//!     → logging.rs (tracing subscriber, pretty or JSON)
//!
//! Consumers:
//!     → EventLog subscribers (broadcast)
//!     → Metrics endpoint (Prometheus scrape)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every event of a connection
//! - Counters are atomics, safe across workers
//! - Events are ordered only within one connection

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventLog, LogEvent, Severity};
pub use metrics::{CounterSnapshot, RequestCounters};
