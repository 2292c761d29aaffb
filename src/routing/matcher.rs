//! Route identifiers and their compiled matchers.
//!
//! # Responsibilities
//! - Describe a route as Exact, Pattern or Mixed (prefix + postfix)
//! - Compile each identifier once into a [`PathMatcher`]
//! - Match a decoded route path and collect named capture groups
//!
//! # Design Decisions
//! - Patterns always match the full path (anchored at both ends)
//! - Mixed identifiers compile into one anchored expression so the prefix and
//!   postfix spans must abut and together consume the whole path
//! - Literal parts of a Mixed identifier are escaped, never interpreted
//! - `(?'name'...)` group syntax is accepted alongside `(?P<name>...)`

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

/// A single part of a Mixed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Pattern(String),
}

impl Segment {
    pub fn literal(s: impl Into<String>) -> Self {
        Segment::Literal(s.into())
    }

    pub fn pattern(s: impl Into<String>) -> Self {
        Segment::Pattern(s.into())
    }

    fn to_regex_source(&self) -> String {
        match self {
            Segment::Literal(s) => regex::escape(s),
            Segment::Pattern(p) => format!("(?:{})", normalize_group_syntax(p)),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Pattern(p) => write!(f, "~{}", p),
        }
    }
}

/// How a route is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteIdentifier {
    /// Literal path, compared with string equality.
    Exact(String),
    /// Regular expression over the whole path.
    Pattern(String),
    /// Optional prefix followed by a mandatory postfix. Used by route groups.
    Mixed {
        prefix: Option<Segment>,
        postfix: Segment,
    },
}

impl RouteIdentifier {
    pub fn exact(path: impl Into<String>) -> Self {
        RouteIdentifier::Exact(path.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        RouteIdentifier::Pattern(pattern.into())
    }

    pub fn mixed(prefix: Option<Segment>, postfix: Segment) -> Self {
        RouteIdentifier::Mixed { prefix, postfix }
    }

    /// Compile into a matcher. Fails only on invalid regular expressions.
    pub fn compile(&self) -> Result<PathMatcher, regex::Error> {
        match self {
            RouteIdentifier::Exact(path) => Ok(PathMatcher::Literal(path.clone())),
            RouteIdentifier::Pattern(pattern) => {
                anchored(&format!("(?:{})", normalize_group_syntax(pattern)))
            }
            RouteIdentifier::Mixed { prefix, postfix } => match (prefix, postfix) {
                (None, Segment::Literal(post)) => Ok(PathMatcher::Literal(post.clone())),
                (Some(Segment::Literal(pre)), Segment::Literal(post)) => {
                    Ok(PathMatcher::Literal(format!("{}{}", pre, post)))
                }
                _ => {
                    let prefix = prefix
                        .as_ref()
                        .map(Segment::to_regex_source)
                        .unwrap_or_default();
                    anchored(&format!("{}{}", prefix, postfix.to_regex_source()))
                }
            },
        }
    }
}

impl fmt::Display for RouteIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteIdentifier::Exact(path) => f.write_str(path),
            RouteIdentifier::Pattern(pattern) => write!(f, "~{}", pattern),
            RouteIdentifier::Mixed { prefix, postfix } => match prefix {
                Some(prefix) => write!(f, "{} + {}", prefix, postfix),
                None => write!(f, "{}", postfix),
            },
        }
    }
}

fn anchored(source: &str) -> Result<PathMatcher, regex::Error> {
    Regex::new(&format!("^{}$", source)).map(PathMatcher::Regex)
}

/// Rewrite `(?'name'` groups into `(?P<name>`.
pub fn normalize_group_syntax(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find("(?'") {
        let escaped = rest[..pos].chars().rev().take_while(|c| *c == '\\').count() % 2 == 1;
        let after = &rest[pos + 3..];
        match after.find('\'') {
            Some(end) if !escaped => {
                out.push_str(&rest[..pos]);
                out.push_str("(?P<");
                out.push_str(&after[..end]);
                out.push('>');
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..pos + 3]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Compiled form of a [`RouteIdentifier`].
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Literal(String),
    Regex(Regex),
}

impl PathMatcher {
    /// Match `path`, returning the named groups that participated.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            PathMatcher::Literal(literal) => (literal == path).then(HashMap::new),
            PathMatcher::Regex(regex) => {
                let caps = regex.captures(path)?;
                Some(
                    regex
                        .capture_names()
                        .flatten()
                        .filter_map(|name| {
                            caps.name(name)
                                .map(|m| (name.to_string(), m.as_str().to_string()))
                        })
                        .collect(),
                )
            }
        }
    }
}
