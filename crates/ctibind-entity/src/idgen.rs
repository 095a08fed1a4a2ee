//! Identifier generation
//!
//! Ids have the form `{namespace prefix}:{prefix}-{suffix}` where the suffix
//! is a random UUID or a counter. A process-wide generator backs
//! [`create_id`]; tests and tools wanting isolation build their own
//! [`IdGenerator`].

use crate::error::{EntityError, Result};
use ctibind_namespace::Namespace;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace used for ids until another one is configured
pub static EXAMPLE_NAMESPACE: Lazy<Namespace> =
    Lazy::new(|| Namespace::new("http://example.com", Some("example"), None));

/// Id prefix used when none is given
pub const DEFAULT_ID_PREFIX: &str = "guid";

/// How id suffixes are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMethod {
    /// Random v4 UUID
    #[default]
    Uuid,
    /// Counter starting at 1
    Int,
}

impl fmt::Display for IdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid => f.write_str("uuid"),
            Self::Int => f.write_str("int"),
        }
    }
}

impl FromStr for IdMethod {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "int" => Ok(Self::Int),
            _ => Err(EntityError::InvalidIdMethod(s.to_string())),
        }
    }
}

/// Id generator bound to a namespace
///
/// # Example
/// ```
/// use ctibind_entity::{IdGenerator, IdMethod};
///
/// let mut ids = IdGenerator::new().with_method(IdMethod::Int);
/// assert_eq!(ids.create_id(None), "example:guid-1");
/// assert_eq!(ids.create_id(Some("indicator")), "example:indicator-2");
/// ```
#[derive(Debug, Clone)]
pub struct IdGenerator {
    namespace: Namespace,
    method: IdMethod,
    next_int: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Generator in the example namespace producing UUIDs
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: EXAMPLE_NAMESPACE.clone(),
            method: IdMethod::Uuid,
            next_int: 1,
        }
    }

    /// With a namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// With a suffix method
    #[must_use]
    pub fn with_method(mut self, method: IdMethod) -> Self {
        self.method = method;
        self
    }

    /// Namespace ids are created in
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Replace the namespace
    pub fn set_namespace(&mut self, namespace: Namespace) {
        self.namespace = namespace;
    }

    /// Suffix method
    #[inline]
    #[must_use]
    pub fn method(&self) -> IdMethod {
        self.method
    }

    /// Replace the suffix method
    pub fn set_method(&mut self, method: IdMethod) {
        self.method = method;
    }

    /// Restart the counter at 1
    pub fn reset(&mut self) {
        self.next_int = 1;
    }

    /// Create a fresh id; `prefix` defaults to `guid`
    ///
    /// A namespace without a prefix yields ids without the leading `ns:`.
    pub fn create_id(&mut self, prefix: Option<&str>) -> String {
        let prefix = prefix.unwrap_or(DEFAULT_ID_PREFIX);
        let suffix = match self.method {
            IdMethod::Uuid => Uuid::new_v4().to_string(),
            IdMethod::Int => {
                let n = self.next_int;
                self.next_int += 1;
                n.to_string()
            }
        };

        match self.namespace.prefix() {
            Some(ns_prefix) => format!("{ns_prefix}:{prefix}-{suffix}"),
            None => format!("{prefix}-{suffix}"),
        }
    }
}

static GENERATOR: Lazy<Mutex<IdGenerator>> = Lazy::new(|| Mutex::new(IdGenerator::new()));

/// Lock the process-wide generator
pub fn generator() -> MutexGuard<'static, IdGenerator> {
    GENERATOR.lock()
}

/// Create an id with the process-wide generator
#[must_use]
pub fn create_id(prefix: Option<&str>) -> String {
    generator().create_id(prefix)
}

/// Set the process-wide id namespace
pub fn set_id_namespace(namespace: Namespace) {
    generator().set_namespace(namespace);
}

/// Set the process-wide id method
pub fn set_id_method(method: IdMethod) {
    generator().set_method(method);
}

/// Process-wide id namespace
#[must_use]
pub fn id_namespace() -> Namespace {
    generator().namespace().clone()
}

/// Uri of the process-wide id namespace
#[must_use]
pub fn get_id_namespace() -> String {
    generator().namespace().uri().to_string()
}

/// Prefix of the process-wide id namespace
#[must_use]
pub fn get_id_namespace_prefix() -> Option<String> {
    generator().namespace().prefix().map(str::to_string)
}

/// Alias of [`get_id_namespace_prefix`]
#[must_use]
pub fn get_id_namespace_alias() -> Option<String> {
    get_id_namespace_prefix()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_ids_count_up() {
        let mut ids = IdGenerator::new().with_method(IdMethod::Int);
        assert_eq!(ids.create_id(None), "example:guid-1");
        assert_eq!(ids.create_id(Some("ttp")), "example:ttp-2");
        ids.reset();
        assert_eq!(ids.create_id(None), "example:guid-1");
    }

    #[test]
    fn uuid_ids_are_unique() {
        let mut ids = IdGenerator::new();
        let a = ids.create_id(None);
        let b = ids.create_id(None);
        assert_ne!(a, b);

        let suffix = a.strip_prefix("example:guid-").unwrap();
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn custom_namespace() {
        let ns = Namespace::new("http://acme.example", Some("acme"), None);
        let mut ids = IdGenerator::new().with_namespace(ns).with_method(IdMethod::Int);
        assert_eq!(ids.create_id(Some("report")), "acme:report-1");

        ids.set_namespace(Namespace::new("urn:bare", None, None));
        assert_eq!(ids.create_id(None), "guid-2");
    }

    #[test]
    fn method_parsing() {
        assert_eq!("INT".parse::<IdMethod>().unwrap(), IdMethod::Int);
        assert_eq!("uuid".parse::<IdMethod>().unwrap(), IdMethod::Uuid);
        assert!(matches!(
            "serial".parse::<IdMethod>(),
            Err(EntityError::InvalidIdMethod(m)) if m == "serial"
        ));
        assert_eq!(IdMethod::Int.to_string(), "int");
    }
}
