//! Parsed request value.
//!
//! A [`Request`] is produced once per connection by the codec. After parsing
//! only two things change: the router records capture groups and middleware
//! records session parameters.

use std::collections::HashMap;

use crate::http::body::Payload;
use crate::http::headers::{Headers, CONTENT_LENGTH, CONTENT_TYPE};
use crate::http::method::Method;
use crate::http::uri;

pub const HTTP_1_1: &str = "HTTP/1.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    /// Percent-decoded path without query or fragment.
    route: String,
    /// Decoded query pairs in order of appearance.
    query: Vec<(String, String)>,
    fragment: Option<String>,
    version: String,
    headers: Headers,
    body: Payload,
    /// Named groups captured by the matched route.
    captures: HashMap<String, String>,
    /// Values middleware hands to later units and the handler.
    session: HashMap<String, String>,
}

impl Request {
    /// Start building a request for `target` (route, query and fragment).
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            target: target.to_string(),
            version: HTTP_1_1.to_string(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        target: uri::Target,
        version: String,
        headers: Headers,
        body: Payload,
    ) -> Self {
        Self {
            method,
            route: target.route,
            query: target.query,
            fragment: target.fragment,
            version,
            headers,
            body,
            captures: HashMap::new(),
            session: HashMap::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Decoded route path, without query or fragment.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }

    /// Named groups captured by the matched route.
    pub fn captures(&self) -> &HashMap<String, String> {
        &self.captures
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    pub(crate) fn set_captures(&mut self, captures: HashMap<String, String>) {
        self.captures = captures;
    }

    /// Parameters recorded by middleware for this request.
    pub fn session(&self) -> &HashMap<String, String> {
        &self.session
    }

    pub fn session_param(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }

    pub fn set_session_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.session.insert(key.into(), value.into());
    }

    /// Wire form of the request target.
    pub fn target(&self) -> String {
        uri::render_target(&self.route, &self.query, self.fragment.as_deref())
    }
}

/// Builder used by clients and tests to assemble a request.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    target: String,
    version: String,
    headers: Headers,
    body: Option<Payload>,
}

impl RequestBuilder {
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Attach a body; `Content-Length` and `Content-Type` follow the payload.
    pub fn body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Result<Request, crate::http::codec::DecodeError> {
        let target = uri::parse_target(&self.target)?;
        let mut headers = self.headers;
        let body = self.body.unwrap_or_default();
        if !body.is_empty() {
            headers.insert(CONTENT_LENGTH, body.len().to_string());
        }
        if let Some(content_type) = body.content_type() {
            headers.insert_if_absent(CONTENT_TYPE, content_type);
        }
        // The header is authoritative, exactly as when decoding off the wire.
        let body = Payload::new(
            body.bytes().clone(),
            headers.get(CONTENT_TYPE).map(str::to_string),
        );
        Ok(Request::from_parts(
            self.method,
            target,
            self.version,
            headers,
            body,
        ))
    }
}
