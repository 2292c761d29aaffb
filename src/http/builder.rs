//! Registration API.
//!
//! Routes, middleware and interceptors are registered on a [`ServerBuilder`]
//! and frozen by [`ServerBuilder::build`]. Group and method middleware chains
//! are resolved here, once, into each endpoint.
//!
//! ```no_run
//! use portico::{Method, Request, Response, RouteIdentifier, ServerBuilder, ServerConfig};
//!
//! # fn demo() -> Result<(), portico::http::BuildError> {
//! let server = ServerBuilder::new(ServerConfig::default())
//!     .route(Method::Get, RouteIdentifier::exact("/"), |_req: Request| async {
//!         anyhow::Ok(Response::text(http::StatusCode::OK, "hello"))
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::config::{validate_config, ServerConfig, ValidationError};
use crate::http::dispatch::Engine;
use crate::http::handler::{Endpoint, Handler};
use crate::http::method::MethodSet;
use crate::http::server::HttpServer;
use crate::middleware::{Interceptor, InterceptorRegistry, Middleware};
use crate::net::tls::{self, IdentityManager, TlsError};
use crate::observability::{EventLog, RequestCounters};
use crate::routing::{RouteError, RouteIdentifier, RouteTable, Segment};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid routes: {}", join(.0))]
    Routes(Vec<RouteError>),

    #[error("Invalid configuration: {}", join(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

fn join<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects registrations for one server.
pub struct ServerBuilder {
    config: ServerConfig,
    routes: RouteTable<Endpoint>,
    /// Global middleware in registration order.
    middleware: Vec<Middleware>,
    interceptors: InterceptorRegistry,
    /// Registration failures, reported together by `build`.
    errors: Vec<RouteError>,
    /// Handed out before `build` so callers can subscribe early.
    events: EventLog,
    counters: Arc<RequestCounters>,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            middleware: Vec::new(),
            interceptors: InterceptorRegistry::new(),
            errors: Vec::new(),
            events: EventLog::new(),
            counters: Arc::new(RequestCounters::new()),
        }
    }

    /// Event stream of the server being built, for handlers that report on it.
    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    /// Request totals of the server being built.
    pub fn counters(&self) -> Arc<RequestCounters> {
        Arc::clone(&self.counters)
    }

    pub fn route<H: Handler>(
        self,
        methods: impl Into<MethodSet>,
        identifier: RouteIdentifier,
        handler: H,
    ) -> Self {
        self.route_with(methods, identifier, Vec::new(), handler)
    }

    /// Register a route whose own middleware runs after the global units.
    pub fn route_with<H: Handler>(
        mut self,
        methods: impl Into<MethodSet>,
        identifier: RouteIdentifier,
        middleware: Vec<Middleware>,
        handler: H,
    ) -> Self {
        let endpoint = Endpoint {
            name: Arc::from(identifier.to_string()),
            handler: Arc::new(handler),
            middleware: Arc::from(middleware),
        };
        self.register(identifier, methods.into(), endpoint);
        self
    }

    /// Add a global unit. Global units run before any scoped unit, in
    /// registration order.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn group(mut self, group: RouteGroup) -> Self {
        tracing::debug!(group = %group.name, routes = group.routes.len(), "Registering route group");
        for route in group.routes {
            let identifier = RouteIdentifier::mixed(group.prefix.clone(), route.postfix);
            let middleware: Vec<Middleware> = group
                .middleware
                .iter()
                .chain(&route.middleware)
                .cloned()
                .collect();
            let endpoint = Endpoint {
                name: Arc::from(identifier.to_string()),
                handler: route.handler,
                middleware: Arc::from(middleware),
            };
            self.register(identifier, route.methods, endpoint);
        }
        self
    }

    pub fn intercept(mut self, status: StatusCode, interceptor: Interceptor) -> Self {
        self.interceptors.register(status, interceptor);
        self
    }

    fn register(&mut self, identifier: RouteIdentifier, methods: MethodSet, endpoint: Endpoint) {
        if let Err(e) = self.routes.register(identifier, methods, endpoint) {
            self.errors.push(e);
        }
    }

    /// Freeze registrations, validate the configuration and resolve the TLS
    /// identity.
    pub fn build(self) -> Result<HttpServer, BuildError> {
        if !self.errors.is_empty() {
            return Err(BuildError::Routes(self.errors));
        }
        validate_config(&self.config).map_err(BuildError::Config)?;

        let acceptor = match IdentityManager::new(self.config.tls.clone()).obtain()? {
            Some(identity) => Some(tls::acceptor(&identity)?),
            None => None,
        };

        let engine = Engine {
            routes: self.routes,
            middleware: self.middleware,
            interceptors: self.interceptors,
            mode: self.config.mode,
            start_line_timeout: Duration::from_millis(self.config.decode.start_line_timeout_ms),
            events: self.events,
            counters: self.counters,
        };

        tracing::info!(
            routes = engine.routes.len(),
            global_middleware = engine.middleware.len(),
            tls = acceptor.is_some(),
            "Server built"
        );

        Ok(HttpServer::new(Arc::new(engine), acceptor, self.config))
    }
}

struct GroupRoute {
    methods: MethodSet,
    postfix: Segment,
    middleware: Vec<Middleware>,
    handler: Arc<dyn Handler>,
}

/// Routes sharing a prefix and a middleware chain.
pub struct RouteGroup {
    /// Used in handler fault origins.
    name: String,
    /// Prepended to every route's postfix.
    prefix: Option<Segment>,
    /// Runs after global middleware and before each route's own units.
    middleware: Vec<Middleware>,
    routes: Vec<GroupRoute>,
}

impl RouteGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            middleware: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: Segment) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Group unit; runs after global units and before method units.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn route<H: Handler>(
        self,
        methods: impl Into<MethodSet>,
        postfix: Segment,
        handler: H,
    ) -> Self {
        self.route_with(methods, postfix, Vec::new(), handler)
    }

    pub fn route_with<H: Handler>(
        mut self,
        methods: impl Into<MethodSet>,
        postfix: Segment,
        middleware: Vec<Middleware>,
        handler: H,
    ) -> Self {
        self.routes.push(GroupRoute {
            methods: methods.into(),
            postfix,
            middleware,
            handler: Arc::new(handler),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsPolicy;
    use crate::http::method::Method;
    use crate::http::request::Request;
    use crate::http::response::Response;
    use crate::middleware::Responsible;

    async fn ok(_req: Request) -> anyhow::Result<Response> {
        Ok(Response::ok())
    }

    fn named(name: &'static str) -> Middleware {
        Middleware::new(name, |_req: &mut Request| Ok(Responsible::next()))
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let result = ServerBuilder::new(ServerConfig::default())
            .route(Method::Get, RouteIdentifier::pattern("/items/(unclosed"), ok)
            .route(MethodSet::EMPTY, RouteIdentifier::exact("/none"), ok)
            .build();
        match result {
            Err(BuildError::Routes(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected route errors, got {:?}", other.err()),
        }
    }

    #[test]
    fn invalid_config_fails_build() {
        let mut config = ServerConfig::default();
        config.listener.max_connections = 0;
        let result = ServerBuilder::new(config).build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[test]
    fn group_resolves_prefix_and_middleware_chain() {
        let group = RouteGroup::new("api")
            .prefix(Segment::literal("/api"))
            .middleware(named("group"))
            .route_with(Method::Get, Segment::literal("/users"), vec![named("method")], ok);
        let server = ServerBuilder::new(ServerConfig::default())
            .middleware(named("global"))
            .group(group)
            .build()
            .unwrap();

        let engine = server.engine();
        assert_eq!(engine.middleware.len(), 1);
        match engine.routes.resolve(Method::Get, "/api/users") {
            crate::routing::Resolution::Matched { value, .. } => {
                let names: Vec<_> = value.middleware().iter().map(|m| m.name().to_string()).collect();
                assert_eq!(names, ["group", "method"]);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn always_policy_builds_tls_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.tls.policy = TlsPolicy::Always;
        config.tls.store_dir = dir.path().to_path_buf();
        let server = ServerBuilder::new(config).build().unwrap();
        assert!(server.is_tls());
    }
}
