//! Middleware and interceptor subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request
//!     → pipeline.rs (global → group → method units, short-circuitable)
//!     → handler (only if no unit terminated)
//!     → interceptor.rs (hooks keyed by final status, single pass)
//!     → response ready for encoding
//! ```
//!
//! # Design Decisions
//! - Units are plain closures registered at startup; chains resolved once
//! - Header accumulator is an explicit value, never shared mutable state
//! - Errors and panics in a unit abort the chain and surface as a fault

pub mod interceptor;
pub mod pipeline;

use std::fmt;
use std::sync::Arc;

use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::Response;

pub use interceptor::{Interceptor, InterceptorRegistry};
pub use pipeline::{Pipeline, PipelineOutcome};

/// What a middleware unit or interceptor decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Responsible {
    /// Run the next unit, merging these headers into the accumulator.
    Continue(Headers),
    /// Stop here and answer with this response.
    Terminate(Response),
}

impl Responsible {
    /// Continue without contributing headers.
    pub fn next() -> Self {
        Responsible::Continue(Headers::new())
    }

    pub fn next_with(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert(key, value);
        Responsible::Continue(headers)
    }
}

type MiddlewareFn = dyn Fn(&mut Request) -> anyhow::Result<Responsible> + Send + Sync;

/// A named middleware unit.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    func: Arc<MiddlewareFn>,
}

impl Middleware {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Request) -> anyhow::Result<Responsible> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, request: &mut Request) -> anyhow::Result<Responsible> {
        (self.func)(request)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}
