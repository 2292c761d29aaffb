//! Ordered header map with case-insensitive keys.
//!
//! Insertion order is preserved so that an encoded message decodes back to an
//! identical value. Keys compare case-insensitively, values are kept verbatim.

use std::fmt;

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONNECTION: &str = "Connection";
pub const ALLOW: &str = "Allow";
pub const X_REQUEST_ID: &str = "X-Request-Id";

/// Header map used by requests, responses and middleware accumulators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

/// A key was already present when inserting with [`Headers::insert_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey(pub String);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Set `key`, replacing an existing value in place. Returns the old value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert only if `key` is absent.
    pub fn insert_new(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DuplicateKey> {
        let key = key.into();
        if self.contains(&key) {
            return Err(DuplicateKey(key));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    /// Set `key` unless it is already present.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains(&key) {
            self.entries.push((key, value.into()));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Merge `other` into `self`, letting `other` win on conflicts.
    pub fn extend_overwrite(&mut self, other: &Headers) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Merge `other` into `self`, keeping existing values on conflicts.
    pub fn fill_missing(&mut self, other: &Headers) {
        for (k, v) in other.iter() {
            self.insert_if_absent(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            write!(f, "{}: {}\r\n", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn insert_new_rejects_duplicates() {
        let mut headers = Headers::new();
        headers.insert_new("Host", "a").unwrap();
        assert_eq!(
            headers.insert_new("host", "b"),
            Err(DuplicateKey("host".to_string()))
        );
        assert_eq!(headers.get("Host"), Some("a"));
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut response: Headers = [("X-A", "response")].into_iter().collect();
        let acc: Headers = [("x-a", "acc"), ("X-B", "acc")].into_iter().collect();
        response.fill_missing(&acc);
        assert_eq!(response.get("X-A"), Some("response"));
        assert_eq!(response.get("X-B"), Some("acc"));
    }

    #[test]
    fn extend_overwrite_replaces_in_place() {
        let mut acc: Headers = [("X-A", "1"), ("X-B", "1")].into_iter().collect();
        acc.extend_overwrite(&[("x-a", "2")].into_iter().collect());
        let pairs: Vec<_> = acc.iter().collect();
        assert_eq!(pairs, vec![("X-A", "2"), ("X-B", "1")]);
    }
}
