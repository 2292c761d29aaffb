//! TCP listener with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address and port
//! - Accept incoming TCP connections
//! - Enforce `max_connections` via semaphore
//!
//! Serialized mode uses [`Listener::accept`] directly. Concurrent mode uses
//! [`Listener::accept_bounded`] so every spawned connection holds a slot.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Invalid bind address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection limit closed")]
    Closed,
}

/// A bounded TCP listener.
///
/// Uses a semaphore to enforce `max_connections`. In concurrent mode, an
/// accept waits for a free slot before taking the next connection.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore limiting concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to `bind_address:port`. Port 0 picks an ephemeral port.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .bind_address
            .parse()
            .map_err(|source| ListenerError::Address {
                address: config.bind_address.clone(),
                source,
            })?;

        let listener = TcpListener::bind(SocketAddr::new(ip, config.port))
            .await
            .map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept the next connection without reserving a slot.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Wait for a free slot, then accept. The permit must live as long as the connection.
    pub async fn accept_bounded(
        &self,
    ) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.inner.local_addr().map_err(ListenerError::Bind)
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot, released on drop (including when the task panics).
#[derive(Debug)]
pub struct ConnectionPermit {
    /// Held for the connection's lifetime; dropping it frees the slot.
    _permit: OwnedSemaphorePermit,
}
