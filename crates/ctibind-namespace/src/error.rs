//! Error types for namespace operations
//!
//! Every variant is a programmer or schema-mismatch error: nothing here is
//! transient, so callers propagate rather than retry.

/// Errors raised by [`NamespaceSet`](crate::NamespaceSet) operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    /// Lookup by namespace URI failed
    #[error("namespace not found: {uri}")]
    NamespaceNotFound {
        /// Namespace looked up
        uri: String,
    },

    /// Lookup by prefix failed
    #[error("prefix not found: {prefix}")]
    PrefixNotFound {
        /// Prefix looked up
        prefix: String,
    },

    /// A prefix would map to two different namespaces
    #[error("can't map prefix '{prefix}' to different namespaces: {existing}, {incoming}")]
    DuplicatePrefix {
        /// Contested prefix
        prefix: String,
        /// Namespace the prefix already maps to
        existing: String,
        /// Namespace that tried to claim it
        incoming: String,
    },

    /// A namespace would get two different schema locations
    #[error("can't map namespace '{uri}' to different schema locations: {existing}, {incoming}")]
    ConflictingSchemaLocation {
        /// Namespace whose location conflicts
        uri: String,
        /// Location already recorded
        existing: String,
        /// Location that was rejected
        incoming: String,
    },

    /// A second namespace prefers default rendering but has no fallback prefix
    #[error("too many default namespaces: needed a prefix for namespace '{uri}' but none are defined")]
    TooManyDefaultNamespaces {
        /// Namespace left without a prefix
        uri: String,
    },

    /// An operation required a prefix for a namespace that has none
    #[error("namespace '{uri}' has no prefixes")]
    NoPrefixes {
        /// Namespace without prefixes
        uri: String,
    },

    /// Structural invariant check failed
    #[error("namespace set is invalid: {0}")]
    InvalidNamespaceSet(String),
}

impl NamespaceError {
    /// Create a duplicate prefix error
    pub fn duplicate_prefix(
        prefix: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self::DuplicatePrefix {
            prefix: prefix.into(),
            existing: existing.into(),
            incoming: incoming.into(),
        }
    }

    /// Create a namespace-not-found error
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NamespaceNotFound { uri: uri.into() }
    }

    /// True for errors caused by two registrations disagreeing
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePrefix { .. } | Self::ConflictingSchemaLocation { .. }
        )
    }

    /// True for failed lookups
    #[inline]
    #[must_use]
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::NamespaceNotFound { .. } | Self::PrefixNotFound { .. }
        )
    }
}

/// Result type alias for namespace operations
pub type NamespaceResult<T> = Result<T, NamespaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_prefix_display_names_both_uris() {
        let err = NamespaceError::duplicate_prefix("a", "urn:a", "urn:b");
        let msg = err.to_string();
        assert!(msg.contains("'a'"));
        assert!(msg.contains("urn:a"));
        assert!(msg.contains("urn:b"));
    }

    #[test]
    fn conflict_classification() {
        assert!(NamespaceError::duplicate_prefix("a", "x", "y").is_conflict());
        assert!(!NamespaceError::not_found("x").is_conflict());
        assert!(NamespaceError::not_found("x").is_lookup_failure());
    }
}
