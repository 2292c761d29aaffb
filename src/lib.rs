//! Portico: a small self-hosted HTTP/1.1 server engine.
//!
//! One request per connection, routed by exact, pattern or mixed
//! identifiers, through a middleware pipeline and status interceptors,
//! over plain TCP or TLS.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod net;
pub mod observability;
pub mod routing;

pub use crate::config::ServerConfig;
pub use crate::error::HandlerFault;
pub use crate::http::{
    Body, HttpServer, Method, MethodSet, Payload, Request, Response, RouteGroup, ServerBuilder,
};
pub use crate::lifecycle::Shutdown;
pub use crate::middleware::{Interceptor, Middleware, Responsible};
pub use crate::routing::{RouteIdentifier, Segment};
