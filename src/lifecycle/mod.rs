//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Signal broadcast → accept loop stops → in-flight connections drain → exit
//! ```
//!
//! # Design Decisions
//! - Shutdown is observed once per accept iteration
//! - In-flight connections are never pre-empted
//! - Concurrent mode drains with a deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
