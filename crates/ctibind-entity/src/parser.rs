//! Document parsing facade
//!
//! Reading XML text is left to an external parser behind [`XmlDocument`].
//! An [`EntityParser`] names the root tags and versions it accepts and the
//! entity class built for each tag; [`EntityParser::parse_document`] checks
//! the document, rebuilds the entity and keeps the document's namespace
//! declarations on it so they survive re-serialization.

use crate::class::EntityClass;
use crate::entity::Entity;
use crate::error::{EntityError, Result};
use crate::value::BindingValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Qualified name of the schema location attribute
pub const SCHEMA_LOCATION_ATTR: &str = "xsi:schemaLocation";

/// A parsed XML document
pub trait XmlDocument {
    /// Tag of the root element
    fn root_tag(&self) -> &str;

    /// Attribute of the root element
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Namespaces declared on the root element, prefix → uri
    ///
    /// The default namespace is keyed by the empty string.
    fn nsmap(&self) -> IndexMap<String, String>;

    /// Value of the root's `xsi:schemaLocation` attribute
    fn schema_location(&self) -> Option<&str> {
        self.attribute(SCHEMA_LOCATION_ATTR)
    }

    /// Binding tree of the whole document
    ///
    /// # Errors
    /// [`EntityError::Collaborator`] if the binding layer cannot build the tree
    fn to_binding(&self) -> Result<BindingValue>;
}

/// Checks applied by [`EntityParser::parse_document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Reject unsupported document versions
    pub check_version: bool,
    /// Reject unsupported root elements
    pub check_root: bool,
}

impl ParseOptions {
    /// Create default options: every check enabled
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With or without the version check
    #[inline]
    #[must_use]
    pub fn with_version_check(mut self, check: bool) -> Self {
        self.check_version = check;
        self
    }

    /// With or without the root element check
    #[inline]
    #[must_use]
    pub fn with_root_check(mut self, check: bool) -> Self {
        self.check_root = check;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            check_version: true,
            check_root: true,
        }
    }
}

/// Maps document roots to entity classes
pub trait EntityParser {
    /// Root tags this parser accepts
    fn supported_tags(&self) -> Vec<String>;

    /// Version declared by the document, if any
    fn get_version(&self, doc: &dyn XmlDocument) -> Option<String>;

    /// Versions accepted for a root tag
    fn supported_versions(&self, tag: &str) -> Vec<String>;

    /// Entity class built for a root tag
    ///
    /// # Errors
    /// [`EntityError::UnresolvedClass`] if the tag maps to no class
    fn entity_class(&self, tag: &str) -> Result<Arc<EntityClass>>;

    /// Reject documents whose root tag is not supported
    ///
    /// # Errors
    /// [`EntityError::UnsupportedRootElement`]
    fn check_root_tag(&self, doc: &dyn XmlDocument) -> Result<()> {
        let supported = self.supported_tags();
        let found = doc.root_tag();
        if supported.iter().any(|tag| tag == found) {
            return Ok(());
        }
        Err(EntityError::UnsupportedRootElement {
            found: found.to_string(),
            expected: supported,
        })
    }

    /// Reject documents without a supported version
    ///
    /// Versions compare numerically per component, so `1.2` equals `1.2.0`.
    ///
    /// # Errors
    /// - [`EntityError::UnknownVersion`] if the document declares none
    /// - [`EntityError::InvalidVersion`] if a version is not dotted numeric
    /// - [`EntityError::UnsupportedVersion`] if it is not supported
    fn check_version(&self, doc: &dyn XmlDocument) -> Result<()> {
        let Some(found) = self.get_version(doc).filter(|v| !v.trim().is_empty()) else {
            return Err(EntityError::UnknownVersion);
        };

        let version = parse_version(&found)?;
        let supported = self.supported_versions(doc.root_tag());
        for candidate in &supported {
            if parse_version(candidate)? == version {
                return Ok(());
            }
        }

        Err(EntityError::UnsupportedVersion {
            found,
            expected: supported,
        })
    }

    /// Check the document and rebuild its entity
    ///
    /// The entity keeps the document's namespace map and schema locations.
    ///
    /// # Errors
    /// - Root tag and version rejections, when enabled
    /// - [`EntityError::Collaborator`] if the document yields no binding object
    /// - Any reconstruction error
    fn parse_document(&self, doc: &dyn XmlDocument, options: &ParseOptions) -> Result<Entity> {
        if options.check_root {
            self.check_root_tag(doc)?;
        }
        if options.check_version {
            self.check_version(doc)?;
        }

        let tag = doc.root_tag();
        let class = self.entity_class(tag)?;
        let binding = doc.to_binding()?;
        let Some(mut entity) = Entity::from_obj(&class, &binding)? else {
            return Err(EntityError::collaborator(format!(
                "document root <{tag}> produced no binding object"
            )));
        };

        for (prefix, uri) in doc.nsmap() {
            entity.add_input_namespace(prefix, uri);
        }
        if let Some(value) = doc.schema_location() {
            for (uri, location) in parse_schemaloc_pairs(value) {
                entity.add_input_schemalocation(uri, location);
            }
        }

        debug!(
            tag,
            class = class.name(),
            namespaces = entity.input_namespaces().len(),
            "parsed document"
        );
        Ok(entity)
    }
}

/// Split an `xsi:schemaLocation` value into (uri, location) pairs
///
/// A trailing unpaired token is ignored.
#[must_use]
pub fn parse_schemaloc_pairs(value: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect()
}

/// Dotted numeric version with trailing zero components dropped
fn parse_version(version: &str) -> Result<Vec<u64>> {
    let mut parts = version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| EntityError::InvalidVersion(version.to_string()))?;

    while parts.last() == Some(&0) {
        parts.pop();
    }
    Ok(parts)
}
