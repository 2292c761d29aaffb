//! Post-response hooks keyed by status code.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;

use crate::error::HandlerFault;
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::middleware::Responsible;

type InterceptorFn =
    dyn Fn(&Request, &mut Response) -> anyhow::Result<Responsible> + Send + Sync;

/// A named hook that may rewrite a response.
#[derive(Clone)]
pub struct Interceptor {
    name: Arc<str>,
    func: Arc<InterceptorFn>,
}

impl Interceptor {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<Responsible> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor").field("name", &self.name).finish()
    }
}

/// Interceptors grouped by the status they react to.
#[derive(Debug, Clone, Default)]
pub struct InterceptorRegistry {
    by_status: HashMap<StatusCode, Vec<Interceptor>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, status: StatusCode, interceptor: Interceptor) {
        self.by_status.entry(status).or_default().push(interceptor);
    }

    pub fn has(&self, status: StatusCode) -> bool {
        self.by_status.get(&status).is_some_and(|list| !list.is_empty())
    }

    /// Run the interceptors registered for the response's status.
    ///
    /// The list is chosen once from the incoming status; a status rewritten
    /// by an interceptor does not select another list.
    pub fn run(&self, request: &Request, mut response: Response) -> Result<Response, HandlerFault> {
        let Some(interceptors) = self.by_status.get(&response.status()) else {
            return Ok(response);
        };

        let mut headers = Headers::new();
        for interceptor in interceptors {
            let origin = || format!("interceptor:{}", interceptor.name());
            let decision = catch_unwind(AssertUnwindSafe(|| {
                (interceptor.func)(request, &mut response)
            }))
            .map_err(|payload| HandlerFault::from_panic(origin(), payload))?
            .map_err(|error| HandlerFault::new(origin(), error))?;

            match decision {
                Responsible::Continue(extra) => headers.extend_overwrite(&extra),
                Responsible::Terminate(replacement) => {
                    tracing::debug!(
                        interceptor = interceptor.name(),
                        status = %replacement.status(),
                        "Interceptor replaced response"
                    );
                    response = replacement;
                    break;
                }
            }
        }

        response.headers_mut().fill_missing(&headers);
        Ok(response)
    }
}
