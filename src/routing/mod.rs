//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded request (method, route path)
//!     → router.rs (ordered scan)
//!     → matcher.rs (Exact / Pattern / Mixed evaluation)
//!     → Return: Matched + captures | MethodNotAllowed | NoMatch
//!
//! Route Compilation (at startup):
//!     RouteIdentifier + MethodSet
//!     → compile patterns (anchored regex)
//!     → append in declaration order
//!     → freeze inside the engine
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by declaration)

pub mod matcher;
pub mod router;

pub use matcher::{PathMatcher, RouteIdentifier, Segment};
pub use router::{Resolution, RouteError, RouteTable};
