//! Accept loop.
//!
//! # Responsibilities
//! - Accept connections on a bound [`Listener`]
//! - Perform the TLS handshake when an identity is configured
//! - Hand each connection to the [`Engine`]
//! - Stop accepting on shutdown and drain in-flight connections
//!
//! # Design Decisions
//! - Serialized mode drives one connection to completion before the next
//!   accept, so shutdown waits for at most one request
//! - Concurrent mode spawns a task per connection, bounded by the listener's
//!   semaphore, and drains up to `concurrency.drain_timeout_secs`
//! - Accept errors never stop the loop; consecutive failures back off
//!   exponentially (10ms doubling up to 1s) so a full descriptor table does
//!   not spin the CPU or flood the event log

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::config::{ServerConfig, WorkerMode};
use crate::http::dispatch::Engine;
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics::record_connection;
use crate::observability::{CounterSnapshot, EventLog, RequestCounters, Severity};

const ACCEPT_BACKOFF_BASE_MS: u64 = 10;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

/// Delay before the next accept after `failures` consecutive errors.
fn accept_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let delay_ms = ACCEPT_BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(failures - 1));
    Duration::from_millis(delay_ms.min(ACCEPT_BACKOFF_MAX_MS))
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A built server, ready to run.
pub struct HttpServer {
    /// Shared with every connection task.
    engine: Arc<Engine>,
    /// Present when the listener speaks TLS.
    tls: Option<TlsAcceptor>,
    /// Validated configuration the server was built from.
    config: ServerConfig,
    /// In-flight connections, drained on shutdown.
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub(crate) fn new(engine: Arc<Engine>, tls: Option<TlsAcceptor>, config: ServerConfig) -> Self {
        Self {
            engine,
            tls,
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn events(&self) -> EventLog {
        self.engine.events().clone()
    }

    pub fn counters(&self) -> Arc<RequestCounters> {
        Arc::clone(self.engine.counters())
    }

    pub fn stats(&self) -> CounterSnapshot {
        self.engine.counters().snapshot()
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<Listener, ServerError> {
        Ok(Listener::bind(&self.config.listener).await?)
    }

    /// Bind, then run until `shutdown` fires.
    pub async fn serve(&self, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.run(listener, shutdown).await
    }

    /// Accept connections until `shutdown` fires (or its sender is dropped).
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let mode = self.config.concurrency.mode;
        self.engine.events().emit(
            Severity::Info,
            format!(
                "Listening on {}://{} ({:?} workers)",
                if self.is_tls() { "https" } else { "http" },
                addr,
                mode
            ),
        );

        match mode {
            WorkerMode::Serialized => self.run_serialized(&listener, &mut shutdown).await,
            WorkerMode::Concurrent => self.run_concurrent(&listener, &mut shutdown).await,
        }

        self.engine.events().emit(Severity::Info, "Server stopped");
        Ok(())
    }

    /// Report an accept error and sleep off the backoff. Returns `false` if
    /// shutdown arrived while waiting.
    async fn back_off(
        &self,
        error: ListenerError,
        failures: u32,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> bool {
        let delay = accept_backoff(failures);
        self.engine.events().emit(Severity::Error, error.to_string());
        tracing::debug!(failures, delay = ?delay, "Backing off after accept error");
        tokio::select! {
            _ = shutdown.recv() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn run_serialized(&self, listener: &Listener, shutdown: &mut broadcast::Receiver<()>) {
        let mut failures = 0u32;
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    let guard = self.tracker.track();
                    handle_connection(&self.engine, self.tls.as_ref(), stream, peer, guard.id())
                        .await;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if !self.back_off(e, failures, shutdown).await {
                        break;
                    }
                }
            }
        }
    }

    async fn run_concurrent(&self, listener: &Listener, shutdown: &mut broadcast::Receiver<()>) {
        let mut failures = 0u32;
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept_bounded() => accepted,
            };
            match accepted {
                Ok((stream, peer, permit)) => {
                    failures = 0;
                    let guard = self.tracker.track();
                    let engine = Arc::clone(&self.engine);
                    let tls = self.tls.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        handle_connection(&engine, tls.as_ref(), stream, peer, guard.id()).await;
                        drop(guard);
                    });
                }
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if !self.back_off(e, failures, shutdown).await {
                        break;
                    }
                }
            }
        }

        let in_flight = self.tracker.active_count();
        if in_flight > 0 {
            tracing::info!(in_flight, "Draining connections");
        }
        let deadline = Duration::from_secs(self.config.concurrency.drain_timeout_secs);
        if !self.tracker.drain(deadline).await {
            self.engine.events().emit(
                Severity::Warning,
                format!(
                    "Drain deadline passed with {} connections still open",
                    self.tracker.active_count()
                ),
            );
        }
    }
}

async fn handle_connection(
    engine: &Engine,
    tls: Option<&TlsAcceptor>,
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
) {
    record_connection();
    let span = tracing::info_span!("connection", id = %id, peer = %peer);

    async {
        let Some(acceptor) = tls else {
            engine.serve_connection(stream, id).await;
            return;
        };
        match tokio::time::timeout(engine.start_line_timeout(), acceptor.accept(stream)).await {
            Ok(Ok(tls_stream)) => engine.serve_connection(tls_stream, id).await,
            Ok(Err(e)) => engine.events().emit(
                Severity::Warning,
                format!("{}: TLS handshake with {} failed: {}", id, peer, e),
            ),
            Err(_) => engine.events().emit(
                Severity::Warning,
                format!("{}: TLS handshake with {} timed out", id, peer),
            ),
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::builder::ServerBuilder;

    fn accept_error() -> ListenerError {
        // EMFILE: the process ran out of file descriptors.
        ListenerError::Accept(std::io::Error::from_raw_os_error(24))
    }

    #[test]
    fn accept_backoff_doubles_up_to_cap() {
        assert_eq!(accept_backoff(0), Duration::ZERO);
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(4), Duration::from_millis(80));
        assert_eq!(accept_backoff(8), Duration::from_millis(1_000));
        assert_eq!(accept_backoff(u32::MAX), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn accept_error_pauses_and_reports() {
        let server = ServerBuilder::new(ServerConfig::default()).build().unwrap();
        let mut events = server.events().subscribe();
        let (_tx, mut shutdown) = broadcast::channel::<()>(1);

        let started = std::time::Instant::now();
        assert!(server.back_off(accept_error(), 3, &mut shutdown).await);
        assert!(started.elapsed() >= Duration::from_millis(40));

        let event = events.recv().await.unwrap();
        assert_eq!(event.severity, Severity::Error);
        assert!(event.message.contains("Failed to accept"));
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let server = ServerBuilder::new(ServerConfig::default()).build().unwrap();
        let (tx, mut shutdown) = broadcast::channel::<()>(1);
        tx.send(()).unwrap();

        let started = std::time::Instant::now();
        assert!(!server.back_off(accept_error(), 30, &mut shutdown).await);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
