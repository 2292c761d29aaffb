//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → tls.rs (optional TLS handshake)
//!     → connection.rs (id, in-flight tracking)
//!     → Hand off to the HTTP engine
//! ```
//!
//! # Design Decisions
//! - Bounded in-flight connections prevent resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use tls::{acceptor, Identity, IdentityManager, IdentitySource, TlsError};
