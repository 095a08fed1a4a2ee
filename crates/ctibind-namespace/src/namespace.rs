//! Namespace value type
//!
//! Provides [`Namespace`], an immutable (uri, prefix, schema location) triple
//! used to build up tables of well-known namespace data.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Simplified XML namespace info
///
/// Exactly one namespace URI plus an optional prefix and schema location.
/// Copied by value; has no lifecycle of its own.
///
/// # Example
/// ```
/// use ctibind_namespace::Namespace;
///
/// let ns = Namespace::new("http://example.com", Some("example"), None);
/// assert_eq!(ns.uri(), "http://example.com");
/// assert_eq!(ns.prefix(), Some("example"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    uri: String,
    prefix: Option<String>,
    schema_location: Option<String>,
}

impl Namespace {
    /// Create a namespace triple
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        prefix: Option<&str>,
        schema_location: Option<&str>,
    ) -> Self {
        Self {
            uri: uri.into(),
            prefix: prefix.map(str::to_string),
            schema_location: schema_location.map(str::to_string),
        }
    }

    /// Namespace URI
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Optional prefix
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Optional schema location
    #[inline]
    #[must_use]
    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}={}", self.uri),
            None => write!(f, "(default)={}", self.uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_accessors() {
        let ns = Namespace::new("http://example.com/", Some("example"), Some(""));
        assert_eq!(ns.uri(), "http://example.com/");
        assert_eq!(ns.prefix(), Some("example"));
        assert_eq!(ns.schema_location(), Some(""));
    }

    #[test]
    fn namespace_equality_is_by_value() {
        let ns1 = Namespace::new("http://example.com/", Some("example"), Some(""));
        let ns2 = Namespace::new("http://example.com/", Some("example"), Some(""));
        let ns3 = Namespace::new("http://example.com", Some("example"), Some(""));

        assert_eq!(ns1, ns2);
        assert_ne!(ns1, ns3);
    }

    #[test]
    fn namespace_display() {
        let ns = Namespace::new("urn:a", None, None);
        assert_eq!(ns.to_string(), "(default)=urn:a");
    }
}
