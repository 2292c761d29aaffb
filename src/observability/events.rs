//! Request event stream.
//!
//! The engine publishes one [`LogEvent`] per answered request plus events
//! for faults and transport failures. Consumers subscribe to a broadcast
//! channel; nothing is persisted and slow subscribers lose old events.
//! Every event is mirrored into `tracing`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    SuccessfulRequest,
    FailedRequest,
    Warning,
    Error,
}

/// One entry of the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Human readable description, e.g. `GET / -> 200 OK [<request id>]`.
    pub message: String,
}

/// Cloneable handle to the event stream.
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Sending never blocks; lagging subscribers lose the oldest events.
    tx: broadcast::Sender<LogEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let event = LogEvent {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };
        match severity {
            Severity::Info | Severity::SuccessfulRequest => {
                tracing::info!(severity = ?severity, "{}", event.message)
            }
            Severity::FailedRequest | Severity::Warning => {
                tracing::warn!(severity = ?severity, "{}", event.message)
            }
            Severity::Error => tracing::error!(severity = ?severity, "{}", event.message),
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let log = EventLog::new();
        let mut rx = log.subscribe();
        log.emit(Severity::Info, "starting");
        log.emit(Severity::FailedRequest, "GET /x -> 404");
        assert_eq!(rx.recv().await.unwrap().message, "starting");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.severity, Severity::FailedRequest);
        assert_eq!(second.message, "GET /x -> 404");
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        EventLog::new().emit(Severity::Warning, "nobody listening");
    }
}
