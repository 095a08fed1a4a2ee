//! XML serialization facade
//!
//! Writing XML text is left to an external binding layer behind
//! [`XmlWriter`]. This module builds what that layer needs: the binding tree
//! and the namespace declarations for the root element.

use crate::collector::{CollectorContext, NamespaceCollector};
use crate::entity::Entity;
use crate::error::Result;
use crate::value::BindingObject;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Writes a binding tree as XML text
pub trait XmlWriter {
    /// Render `root`, declaring `namespace_def` on the root element
    ///
    /// # Errors
    /// [`EntityError::Collaborator`](crate::EntityError::Collaborator) for writer failures
    fn write(&self, root: &BindingObject, namespace_def: &str, pretty: bool) -> Result<String>;
}

/// Serialization options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Declare namespaces and schema locations on the root element
    pub include_namespaces: bool,
    /// Indented output
    pub pretty: bool,
    /// Uri → prefix declarations added to the document
    pub namespace_overrides: IndexMap<String, String>,
    /// Uri → schema location, winning over parsed locations
    pub schemaloc_overrides: IndexMap<String, String>,
}

impl SerializeOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With or without namespace declarations
    #[inline]
    #[must_use]
    pub fn with_namespaces(mut self, include: bool) -> Self {
        self.include_namespaces = include;
        self
    }

    /// With or without indentation
    #[inline]
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// With a namespace prefix override
    #[must_use]
    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.namespace_overrides.insert(uri.into(), prefix.into());
        self
    }

    /// With a schema location override
    #[must_use]
    pub fn with_schemaloc(mut self, uri: impl Into<String>, location: impl Into<String>) -> Self {
        self.schemaloc_overrides.insert(uri.into(), location.into());
        self
    }

    /// Separator between namespace declarations
    #[inline]
    #[must_use]
    pub fn delim(&self) -> &'static str {
        if self.pretty {
            "\n\t"
        } else {
            " "
        }
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            include_namespaces: true,
            pretty: true,
            namespace_overrides: IndexMap::new(),
            schemaloc_overrides: IndexMap::new(),
        }
    }
}

impl Entity {
    /// Serialize through `writer`, against the process-wide namespace registry
    ///
    /// # Errors
    /// As [`Entity::to_xml_with`]
    pub fn to_xml(&self, writer: &dyn XmlWriter, options: &SerializeOptions) -> Result<String> {
        self.to_xml_with(writer, options, &CollectorContext::from_globals())
    }

    /// Serialize through `writer`, finalizing namespaces against `ctx`
    ///
    /// # Errors
    /// - Namespace errors from collector finalization
    /// - Writer failures
    pub fn to_xml_with(
        &self,
        writer: &dyn XmlWriter,
        options: &SerializeOptions,
        ctx: &CollectorContext,
    ) -> Result<String> {
        let mut collector = NamespaceCollector::new();
        let root = self.to_obj_with(&mut collector);

        let namespace_def = if options.include_namespaces {
            collector.finalize(ctx, &options.namespace_overrides, &options.schemaloc_overrides)?;
            namespace_declarations(&collector, options.delim())?
        } else {
            String::new()
        };

        writer.write(&root, &namespace_def, options.pretty)
    }
}

/// `xmlns` declarations followed by the `xsi:schemaLocation` attribute
fn namespace_declarations(collector: &NamespaceCollector, delim: &str) -> Result<String> {
    let parts = [collector.xmlns_string(delim)?, collector.schema_location_string(delim)];
    Ok(parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(delim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::EntityClass;
    use crate::field::TypedField;
    use ctibind_namespace::NamespaceSet;

    struct Recorder;

    impl XmlWriter for Recorder {
        fn write(&self, root: &BindingObject, namespace_def: &str, pretty: bool) -> Result<String> {
            Ok(format!("{}|{pretty}|{namespace_def}", root.class_name()))
        }
    }

    fn context() -> CollectorContext {
        let mut registry = NamespaceSet::new();
        registry
            .add_namespace_uri("urn:test:doc", Some("doc"), Some("doc.xsd"))
            .unwrap();
        CollectorContext::new(registry, crate::idgen::EXAMPLE_NAMESPACE.clone())
    }

    #[test]
    fn options_defaults_and_delim() {
        let options = SerializeOptions::default();
        assert!(options.include_namespaces);
        assert!(options.pretty);
        assert_eq!(options.delim(), "\n\t");
        assert_eq!(options.with_pretty(false).delim(), " ");

        let parsed: SerializeOptions = serde_json::from_str(r#"{"pretty": false}"#).unwrap();
        assert!(parsed.include_namespaces);
        assert!(!parsed.pretty);
    }

    #[test]
    fn writer_receives_declarations() {
        let class = EntityClass::builder("Doc")
            .binding_class("DocType")
            .namespace("urn:test:doc")
            .field(TypedField::new("Title"))
            .build()
            .unwrap();
        let entity = Entity::new(&class).with("title", "t").unwrap();

        let options = SerializeOptions::new().with_pretty(false);
        let out = entity.to_xml_with(&Recorder, &options, &context()).unwrap();

        assert!(out.starts_with("DocType|false|"));
        assert!(out.contains(r#"xmlns:doc="urn:test:doc""#));
        assert!(out.contains(r#"xmlns:example="http://example.com""#));
        assert!(out.contains(r#"xsi:schemaLocation="urn:test:doc doc.xsd""#));

        let bare = entity
            .to_xml_with(&Recorder, &options.with_namespaces(false), &context())
            .unwrap();
        assert_eq!(bare, "DocType|false|");
    }
}
