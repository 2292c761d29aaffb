//! HTTP/1.1 wire codec.
//!
//! # Wire grammar
//! ```text
//! start-line CRLF
//! (Key ": " Value CRLF)*
//! CRLF
//! body (exactly Content-Length bytes, or empty)
//! ```
//!
//! # Design Decisions
//! - Only the wait for the start line is time-bounded
//! - A body shorter than its declared `Content-Length` is kept and the header
//!   rewritten to the number of bytes actually read
//! - No chunked encoding, no trailers, no keep-alive

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::body::Payload;
use crate::http::headers::{Headers, CONTENT_LENGTH, CONTENT_TYPE};
use crate::http::method::Method;
use crate::http::request::{Request, HTTP_1_1};
use crate::http::response::Response;
use crate::http::uri;

/// Failure to decode a message off a stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("no start line received before the deadline")]
    Timeout,
    #[error("connection closed before a message was received")]
    ConnectionClosed,
    #[error("malformed start line `{0}`")]
    MalformedStartLine(String),
    #[error("malformed header line `{0}`")]
    MalformedHeader(String),
    #[error("duplicate header `{0}`")]
    DuplicateHeader(String),
    #[error("malformed query pair `{0}`")]
    MalformedQuery(String),
    #[error("duplicate query parameter `{0}`")]
    DuplicateQueryParameter(String),
    #[error("malformed path `{0}`")]
    MalformedPath(String),
    #[error("i/o error while decoding: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Transport failures get no response; everything else is a 400.
    pub fn is_transport(&self) -> bool {
        matches!(self, DecodeError::ConnectionClosed | DecodeError::Io(_))
    }
}

/// Read one line, stripping the trailing CRLF. `None` on EOF.
async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(line))
}

async fn read_start_line<R>(reader: &mut R, deadline: Duration) -> Result<String, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let line = tokio::time::timeout(deadline, read_line(reader))
        .await
        .map_err(|_| DecodeError::Timeout)??
        .ok_or(DecodeError::ConnectionClosed)?;
    String::from_utf8(line)
        .map_err(|e| DecodeError::MalformedStartLine(String::from_utf8_lossy(e.as_bytes()).into()))
}

async fn read_headers<R>(reader: &mut R) -> Result<Headers, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Headers::new();
    // EOF inside the header block ends it, same as a blank line.
    while let Some(line) = read_line(reader).await? {
        if line.is_empty() {
            break;
        }
        let line = String::from_utf8(line).map_err(|e| {
            DecodeError::MalformedHeader(String::from_utf8_lossy(e.as_bytes()).into())
        })?;
        let mut tokens = line.split(": ");
        let (key, value) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(key), Some(value), None) if !key.is_empty() => (key, value),
            _ => return Err(DecodeError::MalformedHeader(line)),
        };
        headers
            .insert_new(key, value)
            .map_err(|dup| DecodeError::DuplicateHeader(dup.0))?;
    }
    Ok(headers)
}

async fn read_body<R>(reader: &mut R, headers: &mut Headers) -> Result<Payload, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let content_type = headers.get(CONTENT_TYPE).map(str::to_string);
    let declared = match headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        Some(n) => n,
        None => return Ok(Payload::new(Vec::new(), content_type)),
    };

    let mut body = Vec::with_capacity(declared.min(64 * 1024) as usize);
    (&mut *reader).take(declared).read_to_end(&mut body).await?;

    if (body.len() as u64) < declared {
        tracing::debug!(
            declared,
            received = body.len(),
            "Body shorter than Content-Length, truncating"
        );
        headers.insert(CONTENT_LENGTH, body.len().to_string());
    }
    Ok(Payload::new(body, content_type))
}

/// Decode a request. `deadline` bounds the wait for the start line only.
pub async fn read_request<R>(reader: &mut R, deadline: Duration) -> Result<Request, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let start_line = read_start_line(reader, deadline).await?;
    let tokens: Vec<&str> = start_line.split(' ').collect();
    let (method, target, version) = match tokens.as_slice() {
        [method, target, version] if !target.is_empty() && !version.is_empty() => {
            (*method, *target, *version)
        }
        _ => return Err(DecodeError::MalformedStartLine(start_line.clone())),
    };
    let method: Method = method
        .parse()
        .map_err(|_| DecodeError::MalformedStartLine(start_line.clone()))?;
    let target = uri::parse_target(target)?;
    let version = version.to_string();

    let mut headers = read_headers(reader).await?;
    let body = read_body(reader, &mut headers).await?;

    Ok(Request::from_parts(method, target, version, headers, body))
}

/// Decode a response. Only codes with a canonical reason phrase are accepted.
pub async fn read_response<R>(reader: &mut R, deadline: Duration) -> Result<Response, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let start_line = read_start_line(reader, deadline).await?;
    let mut tokens = start_line.splitn(3, ' ');
    let status = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(version), Some(code), Some(_reason)) if version.starts_with("HTTP/") => code
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|status| status.canonical_reason().is_some()),
        _ => None,
    }
    .ok_or_else(|| DecodeError::MalformedStartLine(start_line.clone()))?;

    let mut headers = read_headers(reader).await?;
    let body = read_body(reader, &mut headers).await?;

    Ok(Response::from_parts(status, headers, body))
}

fn put_head(out: &mut BytesMut, start_line: &str, headers: &Headers) {
    out.put_slice(start_line.as_bytes());
    out.put_slice(b"\r\n");
    out.put_slice(headers.to_string().as_bytes());
    out.put_slice(b"\r\n");
}

pub fn encode_request(request: &Request) -> BytesMut {
    let body = request.body().bytes();
    let start_line = format!(
        "{} {} {}",
        request.method(),
        request.target(),
        request.version()
    );
    let mut out = BytesMut::with_capacity(start_line.len() + 256 + body.len());
    put_head(&mut out, &start_line, request.headers());
    out.put_slice(body);
    out
}

/// Encode a response. A status without a canonical reason phrase is written
/// with an empty reason, which [`read_response`] rejects; the engine never
/// lets such a status through.
pub fn encode_response(response: &Response) -> BytesMut {
    let body = response.body().bytes();
    let status = response.status();
    let start_line = format!(
        "{} {} {}",
        HTTP_1_1,
        status.as_str(),
        status.canonical_reason().unwrap_or("")
    );
    let mut out = BytesMut::with_capacity(start_line.len() + 256 + body.len());
    put_head(&mut out, &start_line, response.headers());
    out.put_slice(body);
    out
}
