//! Message bodies.
//!
//! The engine never interprets body content. It threads a [`Payload`] (raw
//! bytes plus the declared content type) between the codec, handlers and the
//! wire. Typed bodies implement [`Body`] to convert to and from a payload.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failure converting a payload into a typed body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capability every body format implements.
pub trait Body: Sized {
    /// Value of the `Content-Type` header for this format.
    const CONTENT_TYPE: &'static str;

    fn to_bytes(&self) -> Bytes;

    fn parse(bytes: &[u8]) -> Result<Self, BodyError>;
}

/// Raw body bytes and the declared content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    bytes: Bytes,
    content_type: Option<String>,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn from_body<B: Body>(body: &B) -> Self {
        Self {
            bytes: body.to_bytes(),
            content_type: Some(B::CONTENT_TYPE.to_string()),
        }
    }

    /// Interpret the bytes as `B`, regardless of the declared content type.
    pub fn parse<B: Body>(&self) -> Result<B, BodyError> {
        B::parse(&self.bytes)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `text/plain` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Body for Text {
    const CONTENT_TYPE: &'static str = "text/plain; charset=utf-8";

    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.0.as_bytes())
    }

    fn parse(bytes: &[u8]) -> Result<Self, BodyError> {
        Ok(Text(std::str::from_utf8(bytes)?.to_string()))
    }
}

/// `text/html` body. Markup is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html(pub String);

impl Body for Html {
    const CONTENT_TYPE: &'static str = "text/html; charset=utf-8";

    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.0.as_bytes())
    }

    fn parse(bytes: &[u8]) -> Result<Self, BodyError> {
        Ok(Html(std::str::from_utf8(bytes)?.to_string()))
    }
}

/// `application/json` body backed by serde.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> Body for Json<T> {
    const CONTENT_TYPE: &'static str = "application/json";

    fn to_bytes(&self) -> Bytes {
        // Serializing plain data structures into a Vec cannot fail; a
        // failing Serialize impl degrades to an empty body.
        serde_json::to_vec(&self.0).map(Bytes::from).unwrap_or_default()
    }

    fn parse(bytes: &[u8]) -> Result<Self, BodyError> {
        Ok(Json(serde_json::from_slice(bytes)?))
    }
}
