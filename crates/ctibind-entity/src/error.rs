//! Error types for entity conversion
//!
//! Provides error handling for:
//! - Field coercion (value → declared type)
//! - Entity reconstruction (dict / binding tree → entity)
//! - Class definition and lookup
//! - Document parsing and writing through external collaborators

use ctibind_namespace::NamespaceError;

/// Errors raised by entity, field and collector operations
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// Value cannot be coerced into a field's declared type
    #[error("{field} must be a {expected}, not a {actual}")]
    TypeMismatch {
        /// Field being set
        field: String,
        /// Declared type name
        expected: String,
        /// Type name of the rejected value
        actual: String,
    },

    /// A scalar could not be turned into an entity by its class constructor
    #[error("could not instantiate a {class} from a {value_type}: {reason}")]
    Construction {
        /// Class being constructed
        class: String,
        /// Type name of the constructor argument
        value_type: String,
        /// Why the constructor rejected it
        reason: String,
    },

    /// No field with the given attribute name on the class
    #[error("{class} has no field '{attr}'")]
    UnknownField {
        /// Class searched
        class: String,
        /// Attribute name looked up
        attr: String,
    },

    /// A class referenced by name was never registered
    #[error("unresolved entity class: {0}")]
    UnresolvedClass(String),

    /// A factory could not map a type key to a class
    #[error("no entity class registered for type key {key:?}")]
    UnknownTypeKey {
        /// Type key read from the input, if any
        key: Option<String>,
    },

    /// Class declaration is malformed
    #[error("invalid class definition for {class}: {reason}")]
    ClassDefinition {
        /// Class being declared
        class: String,
        /// What is wrong with the declaration
        reason: String,
    },

    /// Sequence operation on an entity whose class is not a list class
    #[error("{0} is not an entity list class")]
    NotAList(String),

    /// Sequence index past the end
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the list
        len: usize,
    },

    /// Document root element not handled by the parser
    #[error("document root element ({found}) not one of ({expected:?})")]
    UnsupportedRootElement {
        /// Root tag of the document
        found: String,
        /// Root tags the parser accepts
        expected: Vec<String>,
    },

    /// Document carries no version information
    #[error("unable to determine the version of the input document")]
    UnknownVersion,

    /// Version string is not a dotted numeric version
    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    /// Document version not handled by the parser
    #[error("document version ({found}) not in supported versions ({expected:?})")]
    UnsupportedVersion {
        /// Version declared by the document
        found: String,
        /// Versions the parser accepts
        expected: Vec<String>,
    },

    /// Unknown id generation method
    #[error("invalid id generation method: {0}")]
    InvalidIdMethod(String),

    /// External XML collaborator failure
    #[error("xml collaborator error: {0}")]
    Collaborator(String),

    /// Namespace registry error
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EntityError {
    /// Create a type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a construction error
    pub fn construction(
        class: impl Into<String>,
        value_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Construction {
            class: class.into(),
            value_type: value_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a class definition error
    pub fn class_definition(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClassDefinition {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// Create a collaborator error
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// True for errors caused by data not fitting the declared schema
    #[inline]
    #[must_use]
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::Construction { .. })
    }

    /// True for errors raised while checking a parsed document's root
    #[inline]
    #[must_use]
    pub fn is_document_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedRootElement { .. }
                | Self::UnknownVersion
                | Self::InvalidVersion(_)
                | Self::UnsupportedVersion { .. }
        )
    }
}

/// Result type alias for entity operations
pub type Result<T> = std::result::Result<T, EntityError>;
