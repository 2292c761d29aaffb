//! Short-circuitable middleware chain.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::HandlerFault;
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::middleware::{Middleware, Responsible};

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Set when a unit terminated; accumulator headers already filled in.
    pub response: Option<Response>,
    /// Headers gathered from every unit that ran.
    pub headers: Headers,
}

impl PipelineOutcome {
    /// Fill `response` with the accumulated headers it does not set itself.
    pub fn apply_headers(&self, response: &mut Response) {
        response.headers_mut().fill_missing(&self.headers);
    }
}

/// Global units followed by the endpoint's scoped units.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    global: &'a [Middleware],
    scoped: &'a [Middleware],
}

impl<'a> Pipeline<'a> {
    pub fn new(global: &'a [Middleware], scoped: &'a [Middleware]) -> Self {
        Self { global, scoped }
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.scoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run units in order until one terminates or all continue.
    pub fn run(&self, request: &mut Request) -> Result<PipelineOutcome, HandlerFault> {
        let mut headers = Headers::new();

        for unit in self.global.iter().chain(self.scoped) {
            let origin = || format!("middleware:{}", unit.name());
            let decision = catch_unwind(AssertUnwindSafe(|| unit.call(request)))
                .map_err(|payload| HandlerFault::from_panic(origin(), payload))?
                .map_err(|error| HandlerFault::new(origin(), error))?;

            match decision {
                Responsible::Continue(extra) => headers.extend_overwrite(&extra),
                Responsible::Terminate(mut response) => {
                    tracing::debug!(unit = unit.name(), status = %response.status(), "Middleware terminated request");
                    response.headers_mut().fill_missing(&headers);
                    return Ok(PipelineOutcome {
                        response: Some(response),
                        headers,
                    });
                }
            }
        }

        Ok(PipelineOutcome {
            response: None,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::method::Method;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request() -> Request {
        Request::builder(Method::Get, "/").build().unwrap()
    }

    fn header(name: &'static str, key: &'static str, value: &'static str) -> Middleware {
        Middleware::new(name, move |_| Ok(Responsible::next_with(key, value)))
    }

    #[test]
    fn all_continue_returns_accumulated_headers() {
        let global = [header("a", "X-A", "1")];
        let scoped = [header("b", "X-B", "2"), header("c", "X-A", "3")];
        let outcome = Pipeline::new(&global, &scoped).run(&mut request()).unwrap();
        assert!(outcome.response.is_none());
        assert_eq!(outcome.headers.get("X-A"), Some("3"));
        assert_eq!(outcome.headers.get("X-B"), Some("2"));
    }

    #[test]
    fn terminate_stops_chain_and_keeps_response_headers() {
        let ran_after = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran_after);
        let global = [
            header("cors", "X-Shared", "from-acc"),
            Middleware::new("deny", |_| {
                Ok(Responsible::Terminate(
                    Response::text(StatusCode::FORBIDDEN, "no").header("X-Shared", "from-response"),
                ))
            }),
            Middleware::new("never", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Responsible::next())
            }),
        ];
        let outcome = Pipeline::new(&global, &[]).run(&mut request()).unwrap();
        let response = outcome.response.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get("X-Shared"), Some("from-response"));
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn global_units_run_before_scoped_units() {
        let global = [Middleware::new("first", |req: &mut Request| {
            req.set_session_param("order", "global");
            Ok(Responsible::next())
        })];
        let scoped = [Middleware::new("second", |req: &mut Request| {
            let seen = req.session_param("order").unwrap_or("none").to_string();
            req.set_session_param("order", format!("{}>scoped", seen));
            Ok(Responsible::next())
        })];
        let mut req = request();
        Pipeline::new(&global, &scoped).run(&mut req).unwrap();
        assert_eq!(req.session_param("order"), Some("global>scoped"));
    }

    #[test]
    fn error_aborts_with_origin() {
        let global = [
            Middleware::new("auth", |_| Err(anyhow::anyhow!("token store offline"))),
            header("late", "X-Late", "1"),
        ];
        let fault = Pipeline::new(&global, &[]).run(&mut request()).unwrap_err();
        assert_eq!(fault.origin, "middleware:auth");
        assert!(fault.error.to_string().contains("token store offline"));
    }

    #[test]
    fn panic_is_contained_as_fault() {
        let global = [Middleware::new("explodes", |_| panic!("kaboom"))];
        let fault = Pipeline::new(&global, &[]).run(&mut request()).unwrap_err();
        assert_eq!(fault.origin, "middleware:explodes");
        assert!(fault.error.to_string().contains("kaboom"));
    }

    #[test]
    fn running_twice_yields_the_same_outcome() {
        let global = [
            header("a", "X-A", "1"),
            Middleware::new("gate", |req: &mut Request| {
                if req.route() == "/" {
                    Ok(Responsible::Terminate(Response::text(StatusCode::UNAUTHORIZED, "login")))
                } else {
                    Ok(Responsible::next())
                }
            }),
        ];
        let pipeline = Pipeline::new(&global, &[]);
        let first = pipeline.run(&mut request()).unwrap();
        let second = pipeline.run(&mut request()).unwrap();
        assert_eq!(first, second);
    }
}
