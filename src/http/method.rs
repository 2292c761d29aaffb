//! Request methods and method masks.
//!
//! A parsed request always carries exactly one [`Method`]. Route
//! registrations carry a [`MethodSet`], a bit mask over the same closed set.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// The closed set of methods the codec accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Connect,
        Method::Options,
        Method::Trace,
        Method::Patch,
    ];

    /// Wire token for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token is not one of the supported methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized method token `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Method tokens are case-sensitive on the wire.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Bit mask of allowed methods for a route registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodSet(u16);

impl MethodSet {
    pub const EMPTY: MethodSet = MethodSet(0);
    pub const ANY: MethodSet = MethodSet((1 << Method::ALL.len()) - 1);

    pub fn contains(&self, method: Method) -> bool {
        self.0 & method.bit() != 0
    }

    pub fn with(self, method: Method) -> Self {
        MethodSet(self.0 | method.bit())
    }

    pub fn union(self, other: MethodSet) -> Self {
        MethodSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl From<Method> for MethodSet {
    fn from(method: Method) -> Self {
        MethodSet(method.bit())
    }
}

impl<const N: usize> From<[Method; N]> for MethodSet {
    fn from(methods: [Method; N]) -> Self {
        methods.into_iter().fold(MethodSet::EMPTY, MethodSet::with)
    }
}

impl BitOr for Method {
    type Output = MethodSet;

    fn bitor(self, rhs: Method) -> MethodSet {
        MethodSet::from(self).with(rhs)
    }
}

impl BitOr<Method> for MethodSet {
    type Output = MethodSet;

    fn bitor(self, rhs: Method) -> MethodSet {
        self.with(rhs)
    }
}

impl BitOr for MethodSet {
    type Output = MethodSet;

    fn bitor(self, rhs: MethodSet) -> MethodSet {
        self.union(rhs)
    }
}

/// Renders as a comma separated list, the format of an `Allow` header.
impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(method.as_str())?;
        }
        Ok(())
    }
}
