//! Request-target decomposition and percent coding.
//!
//! A target such as `/a%20b/c?x=1&y=2#top` splits into a route (`/a b/c`),
//! ordered query parameters and an optional fragment. Each part is
//! percent-decoded on the way in and re-encoded with [`RESERVED`] on the way
//! out.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::http::codec::DecodeError;

/// Characters escaped when rendering a target. Space and controls are added
/// so an encoded target never breaks the start line.
pub const RESERVED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'*')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b';')
    .add(b':')
    .add(b'@')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'$')
    .add(b',')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'%');

/// Decomposed request target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub route: String,
    pub query: Vec<(String, String)>,
    pub fragment: Option<String>,
}

fn decode(raw: &str) -> Result<String, DecodeError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| DecodeError::MalformedPath(raw.to_string()))
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, RESERVED).to_string()
}

/// Split and decode a raw request target.
pub fn parse_target(raw: &str) -> Result<Target, DecodeError> {
    let (before_fragment, fragment) = match raw.split_once('#') {
        Some((head, frag)) => (head, Some(decode(frag)?)),
        None => (raw, None),
    };
    let (route, query) = match before_fragment.split_once('?') {
        Some((route, query)) => (route, parse_query(query)?),
        None => (before_fragment, Vec::new()),
    };

    let route = route
        .split('/')
        .map(decode)
        .collect::<Result<Vec<_>, _>>()?
        .join("/");

    Ok(Target {
        route,
        query,
        fragment,
    })
}

/// Parse `k=v&k2=v2`. Every pair needs exactly one `=` and keys are unique.
pub fn parse_query(raw: &str) -> Result<Vec<(String, String)>, DecodeError> {
    let mut params: Vec<(String, String)> = Vec::new();
    if raw.is_empty() {
        return Ok(params);
    }
    for pair in raw.split('&') {
        let mut parts = pair.split('=');
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(v), None) => (decode(k)?, decode(v)?),
            _ => return Err(DecodeError::MalformedQuery(pair.to_string())),
        };
        if params.iter().any(|(k, _)| *k == key) {
            return Err(DecodeError::DuplicateQueryParameter(key));
        }
        params.push((key, value));
    }
    Ok(params)
}

/// Render a target back into its wire form.
pub fn render_target(route: &str, query: &[(String, String)], fragment: Option<&str>) -> String {
    let mut out = route.split('/').map(encode).collect::<Vec<_>>().join("/");
    if !query.is_empty() {
        out.push('?');
        let pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect();
        out.push_str(&pairs.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(&encode(fragment));
    }
    out
}
