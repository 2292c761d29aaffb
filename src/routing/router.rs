//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Resolve (method, path) into a matched value, a method mismatch or no match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order, first path+method match wins
//! - A path match with the wrong method keeps scanning; 405 only when no later
//!   registration matches both
//! - Explicit NoMatch rather than silent default

use std::collections::HashMap;

use crate::http::method::{Method, MethodSet};
use crate::routing::matcher::{PathMatcher, RouteIdentifier};

/// Error registering a route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid pattern in route `{identifier}`: {source}")]
    InvalidPattern {
        identifier: String,
        #[source]
        source: regex::Error,
    },
    #[error("route `{0}` allows no methods")]
    EmptyMethodSet(String),
}

#[derive(Debug)]
struct Route<T> {
    identifier: RouteIdentifier,
    matcher: PathMatcher,
    methods: MethodSet,
    value: T,
}

/// Outcome of [`RouteTable::resolve`].
#[derive(Debug)]
pub enum Resolution<'a, T> {
    Matched {
        value: &'a T,
        captures: HashMap<String, String>,
    },
    /// The path matched at least one route, none of which allows the method.
    MethodNotAllowed { allowed: MethodSet },
    NoMatch,
}

/// Ordered table of routes.
#[derive(Debug)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Overlaps are allowed; earlier registrations win.
    pub fn register(
        &mut self,
        identifier: RouteIdentifier,
        methods: MethodSet,
        value: T,
    ) -> Result<(), RouteError> {
        if methods.is_empty() {
            return Err(RouteError::EmptyMethodSet(identifier.to_string()));
        }
        let matcher = identifier
            .compile()
            .map_err(|source| RouteError::InvalidPattern {
                identifier: identifier.to_string(),
                source,
            })?;
        tracing::debug!(route = %identifier, methods = %methods, "Route registered");
        self.routes.push(Route {
            identifier,
            matcher,
            methods,
            value,
        });
        Ok(())
    }

    pub fn resolve(&self, method: Method, path: &str) -> Resolution<'_, T> {
        let mut allowed = MethodSet::EMPTY;
        for route in &self.routes {
            let Some(captures) = route.matcher.matches(path) else {
                continue;
            };
            if route.methods.contains(method) {
                return Resolution::Matched {
                    value: &route.value,
                    captures,
                };
            }
            allowed = allowed.union(route.methods);
        }
        if allowed.is_empty() {
            Resolution::NoMatch
        } else {
            Resolution::MethodNotAllowed { allowed }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered identifiers with their method masks, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteIdentifier, MethodSet)> {
        self.routes.iter().map(|r| (&r.identifier, r.methods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::Segment;

    fn table(routes: Vec<(RouteIdentifier, MethodSet, &'static str)>) -> RouteTable<&'static str> {
        let mut table = RouteTable::new();
        for (identifier, methods, name) in routes {
            table.register(identifier, methods, name).unwrap();
        }
        table
    }

    fn matched<'a>(resolution: Resolution<'a, &'static str>) -> (&'static str, HashMap<String, String>) {
        match resolution {
            Resolution::Matched { value, captures } => (*value, captures),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn exact_matches_iff_path_and_method_match() {
        let t = table(vec![(RouteIdentifier::exact("/items"), Method::Get.into(), "items")]);
        assert_eq!(matched(t.resolve(Method::Get, "/items")).0, "items");
        assert!(matches!(t.resolve(Method::Get, "/items/1"), Resolution::NoMatch));
        assert!(matches!(
            t.resolve(Method::Post, "/items"),
            Resolution::MethodNotAllowed { .. }
        ));
    }

    #[test]
    fn pattern_captures_named_groups() {
        let t = table(vec![(
            RouteIdentifier::pattern("/users/(?'user'[^/]+)"),
            Method::Get.into(),
            "user",
        )]);
        let (name, captures) = matched(t.resolve(Method::Get, "/users/me"));
        assert_eq!(name, "user");
        assert_eq!(captures.len(), 1);
        assert_eq!(captures["user"], "me");
    }

    #[test]
    fn first_registration_wins_on_overlap() {
        let t = table(vec![
            (RouteIdentifier::pattern("/a/.*"), MethodSet::ANY, "wide"),
            (RouteIdentifier::exact("/a/b"), MethodSet::ANY, "narrow"),
        ]);
        assert_eq!(matched(t.resolve(Method::Get, "/a/b")).0, "wide");
    }

    #[test]
    fn method_mismatch_keeps_scanning() {
        let t = table(vec![
            (RouteIdentifier::exact("/items"), Method::Post.into(), "create"),
            (RouteIdentifier::pattern("/item.*"), Method::Get.into(), "list"),
        ]);
        assert_eq!(matched(t.resolve(Method::Get, "/items")).0, "list");
    }

    #[test]
    fn method_not_allowed_reports_union_of_masks() {
        let t = table(vec![
            (RouteIdentifier::exact("/items"), Method::Post.into(), "create"),
            (
                RouteIdentifier::mixed(None, Segment::literal("/items")),
                Method::Put | Method::Delete,
                "replace",
            ),
        ]);
        match t.resolve(Method::Get, "/items") {
            Resolution::MethodNotAllowed { allowed } => {
                assert!(allowed.contains(Method::Post));
                assert!(allowed.contains(Method::Put));
                assert!(allowed.contains(Method::Delete));
                assert!(!allowed.contains(Method::Get));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolve_does_not_mutate_table() {
        let t = table(vec![(RouteIdentifier::exact("/x"), MethodSet::ANY, "x")]);
        let before: Vec<_> = t.iter().map(|(id, m)| (id.clone(), m)).collect();
        let _ = t.resolve(Method::Get, "/x");
        let _ = t.resolve(Method::Get, "/y");
        let after: Vec<_> = t.iter().map(|(id, m)| (id.clone(), m)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn rejects_invalid_patterns_and_empty_masks() {
        let mut t: RouteTable<()> = RouteTable::new();
        assert!(matches!(
            t.register(RouteIdentifier::pattern("(("), MethodSet::ANY, ()),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            t.register(RouteIdentifier::exact("/"), MethodSet::EMPTY, ()),
            Err(RouteError::EmptyMethodSet(_))
        ));
        assert!(t.is_empty());
    }
}
