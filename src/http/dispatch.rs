//! Per-connection request processing.
//!
//! # Responsibilities
//! - Decode exactly one request from the connection
//! - Route it, run the middleware chain and the handler
//! - Run interceptors for the final status
//! - Finalize, encode and write the response, then close
//! - Record one counter increment and one request event per response
//!
//! # Data Flow
//! ```text
//! Decoding ──DecodeError──────────────────────────────► 400 ─┐
//!    │                                                       │
//! Routing ──NoMatch / MethodNotAllowed──► 404 / 405 ─┐       │
//!    │                                               ▼       │
//! Middleware ──Terminate──► response ──────────► Interception│
//!    │                                               ▲       │
//! Handling ──────────────────────────────────────────┘       │
//!    │ (fault anywhere above or in interception)             │
//!    └─────────────────────────────────────────► 500 ────────┤
//!                                                            ▼
//!                                                  Finalize → Write → Close
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::config::ServerMode;
use crate::error::HandlerFault;
use crate::http::codec;
use crate::http::handler::Endpoint;
use crate::http::headers::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, X_REQUEST_ID};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::middleware::{InterceptorRegistry, Middleware, Pipeline};
use crate::net::ConnectionId;
use crate::observability::{EventLog, RequestCounters, Severity};
use crate::routing::{Resolution, RouteTable};

/// Everything needed to answer a request. Immutable once built and shared
/// between workers behind an `Arc`.
pub struct Engine {
    /// Registered routes in registration order.
    pub(crate) routes: RouteTable<Endpoint>,
    /// Global middleware, run before each route's own units.
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) interceptors: InterceptorRegistry,
    /// Decides whether fault detail reaches the client.
    pub(crate) mode: ServerMode,
    /// Deadline for the start line, reused for the TLS handshake.
    pub(crate) start_line_timeout: Duration,
    pub(crate) events: EventLog,
    pub(crate) counters: Arc<RequestCounters>,
}

impl Engine {
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn counters(&self) -> &Arc<RequestCounters> {
        &self.counters
    }

    pub fn start_line_timeout(&self) -> Duration {
        self.start_line_timeout
    }

    /// Serve one request on `stream` and close it.
    pub async fn serve_connection<S>(&self, stream: S, connection: ConnectionId)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut reader = BufReader::new(stream);

        let (mut response, label) =
            match codec::read_request(&mut reader, self.start_line_timeout).await {
                Ok(request) => {
                    let label = format!("{} {}", request.method(), request.route());
                    (self.respond(request).await, label)
                }
                Err(e) if e.is_transport() => {
                    self.events.emit(
                        Severity::Warning,
                        format!("{}: connection dropped before a request was read: {}", connection, e),
                    );
                    return;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection, error = %e, "Malformed request");
                    (Response::bad_request(&e), "<malformed request>".to_string())
                }
            };

        finalize(&mut response);
        let encoded = codec::encode_response(&response);

        let mut stream = reader.into_inner();
        let written = async {
            stream.write_all(&encoded).await?;
            stream.flush().await?;
            stream.shutdown().await
        }
        .await;
        if let Err(e) = written {
            self.events.emit(
                Severity::Warning,
                format!("{}: failed to write response: {}", connection, e),
            );
        }

        let successful = response.is_successful();
        self.counters.record(successful);
        let severity = if successful {
            Severity::SuccessfulRequest
        } else {
            Severity::FailedRequest
        };
        self.events.emit(
            severity,
            format!(
                "{} -> {} [{}]",
                label,
                response.status(),
                response.headers().get(X_REQUEST_ID).unwrap_or("-")
            ),
        );
    }

    /// Produce the response for a decoded request. Never fails: faults
    /// become a 500 that skips interception.
    pub async fn respond(&self, mut request: Request) -> Response {
        let outcome = match self.routes.resolve(request.method(), request.route()) {
            Resolution::NoMatch => Ok(Response::not_found(request.route())),
            Resolution::MethodNotAllowed { allowed } => Ok(Response::method_not_allowed(
                request.method(),
                request.route(),
                allowed,
            )),
            Resolution::Matched { value, captures } => {
                request.set_captures(captures);
                self.dispatch(value, &mut request).await
            }
        };

        match outcome
            .and_then(|response| self.interceptors.run(&request, response))
            .and_then(require_standard_status)
        {
            Ok(response) => response,
            Err(fault) => self.fault_response(fault),
        }
    }

    async fn dispatch(
        &self,
        endpoint: &Endpoint,
        request: &mut Request,
    ) -> Result<Response, HandlerFault> {
        let outcome = Pipeline::new(&self.middleware, endpoint.middleware()).run(request)?;
        if let Some(response) = outcome.response {
            return Ok(response);
        }

        let origin = format!("handler:{}", endpoint.name());
        let handler = Arc::clone(&endpoint.handler);
        let input = request.clone();
        let mut response = AssertUnwindSafe(async move { handler.call(input).await })
            .catch_unwind()
            .await
            .map_err(|payload| HandlerFault::from_panic(origin.clone(), payload))?
            .map_err(|error| HandlerFault::new(origin, error))?;

        outcome.apply_headers(&mut response);
        Ok(response)
    }

    fn fault_response(&self, fault: HandlerFault) -> Response {
        self.events.emit(Severity::Error, fault.to_string());
        let detail = match self.mode {
            ServerMode::Development => Some(fault.detail()),
            ServerMode::Production => None,
        };
        Response::internal_error(detail)
    }
}

/// Only statuses with a reason phrase can be written and read back.
fn require_standard_status(response: Response) -> Result<Response, HandlerFault> {
    if response.has_standard_status() {
        Ok(response)
    } else {
        Err(HandlerFault::new(
            "response",
            anyhow::anyhow!("status {} has no standard reason phrase", response.status().as_u16()),
        ))
    }
}

/// Headers every outgoing response carries.
fn finalize(response: &mut Response) {
    let length = response.body().len();
    let content_type = response.body().content_type().map(str::to_owned);
    let headers = response.headers_mut();

    headers.insert(CONTENT_LENGTH, length.to_string());
    if let Some(content_type) = content_type {
        headers.insert_if_absent(CONTENT_TYPE, content_type);
    }
    headers.insert(CONNECTION, "close");
    headers.insert_if_absent(X_REQUEST_ID, Uuid::new_v4().to_string());
}
