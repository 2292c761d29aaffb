//! Endpoint handlers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::middleware::Middleware;

/// Async request handler. Implemented for any
/// `Fn(Request) -> impl Future<Output = anyhow::Result<Response>>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request) -> BoxFuture<'static, anyhow::Result<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, anyhow::Result<Response>> {
        Box::pin(self(request))
    }
}

/// A registered route target: the handler plus its scoped middleware chain
/// (group units followed by method units), resolved at build time.
#[derive(Clone)]
pub struct Endpoint {
    pub(crate) name: Arc<str>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) middleware: Arc<[Middleware]>,
}

impl Endpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("middleware", &self.middleware)
            .finish()
    }
}
