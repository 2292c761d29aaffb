//! Response value and the engine's built-in responses.

use http::StatusCode;

use crate::http::body::{Body, Payload, Text};
use crate::http::headers::{Headers, ALLOW};
use crate::http::method::{Method, MethodSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Payload,
}

impl Response {
    /// A bodiless response. The engine answers 500 instead of a status
    /// without a standard reason phrase (see [`Response::has_standard_status`]).
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Payload::empty(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Response carrying a typed body.
    pub fn with_body<B: Body>(status: StatusCode, body: &B) -> Self {
        Self::new(status).payload(Payload::from_body(body))
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::with_body(status, &Text(text.into()))
    }

    pub fn payload(mut self, body: Payload) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Whether the status has a canonical reason phrase and can be encoded
    /// into a start line the decoder accepts.
    pub fn has_standard_status(&self) -> bool {
        self.status.canonical_reason().is_some()
    }

    /// Anything below 400 counts as a successful request.
    pub fn is_successful(&self) -> bool {
        self.status.as_u16() < 400
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }

    pub fn set_body(&mut self, body: Payload) {
        self.body = body;
    }

    pub(crate) fn from_parts(status: StatusCode, headers: Headers, body: Payload) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub(crate) fn bad_request(detail: impl std::fmt::Display) -> Self {
        Self::text(StatusCode::BAD_REQUEST, format!("Bad Request: {}", detail))
    }

    pub(crate) fn not_found(route: &str) -> Self {
        Self::text(StatusCode::NOT_FOUND, format!("No route matches {}", route))
    }

    pub(crate) fn method_not_allowed(method: Method, route: &str, allowed: MethodSet) -> Self {
        Self::text(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {} is not allowed for {}", method, route),
        )
        .header(ALLOW, allowed.to_string())
    }

    pub(crate) fn internal_error(detail: Option<String>) -> Self {
        let body = match detail {
            Some(detail) => format!("Internal Server Error\n\n{}", detail),
            None => "Internal Server Error".to_string(),
        };
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_status_needs_reason_phrase() {
        assert!(Response::new(StatusCode::IM_A_TEAPOT).has_standard_status());
        let mut res = Response::ok();
        res.set_status(StatusCode::from_u16(599).unwrap());
        assert!(!res.has_standard_status());
    }

    #[test]
    fn success_boundary_is_400() {
        assert!(Response::new(StatusCode::PERMANENT_REDIRECT).is_successful());
        assert!(!Response::new(StatusCode::BAD_REQUEST).is_successful());
    }

    #[test]
    fn method_not_allowed_names_method_and_path() {
        let res = Response::method_not_allowed(Method::Get, "/items", Method::Post.into());
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers().get("allow"), Some("POST"));
        let body = std::str::from_utf8(res.body().bytes()).unwrap();
        assert!(body.contains("GET"));
        assert!(body.contains("/items"));
    }
}
