//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, TLS handshake, worker mode)
//!     → codec.rs (decode one request: start line, headers, body)
//!     → dispatch.rs (routing, middleware, handler, interceptors)
//!     → codec.rs (encode response)
//!     → Send to client, close
//! ```
//!
//! Values: `method`, `headers`, `body`, `uri`, `request`, `response`.
//! Registration: `handler`, `builder`.

pub mod body;
pub mod builder;
pub mod codec;
pub mod dispatch;
pub mod handler;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod server;
pub mod uri;

pub use body::{Body, BodyError, Html, Json, Payload, Text};
pub use builder::{BuildError, RouteGroup, ServerBuilder};
pub use codec::DecodeError;
pub use dispatch::Engine;
pub use handler::{Endpoint, Handler};
pub use headers::Headers;
pub use method::{Method, MethodSet};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use server::{HttpServer, ServerError};
