//! Testing utilities for ctibind workspace
//!
//! Shared fixture classes, collaborator doubles and tracing setup.

#![allow(missing_docs)]

use ctibind_entity::{
    BindingObject, BindingValue, CollectorContext, Entity, EntityClass, EntityError, Result,
    ScalarKind, TypedField, XmlDocument, XmlWriter, EXAMPLE_NAMESPACE,
};
use ctibind_namespace::{registry, NS_XLINK, NS_XML_SCHEMA, NS_XML_SCHEMA_INSTANCE};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ordered_map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ── entity fixtures ────────────────────────────────────────────────

/// `Foo` with a single untyped `Name` field, constructible from its name
pub fn foo_class() -> Arc<EntityClass> {
    EntityClass::builder("Foo")
        .field(TypedField::new("Name"))
        .constructor(|class, value| Entity::new(class).with("name", value))
        .build()
        .unwrap()
}

/// List of `Foo`
pub fn foo_list_class(foo: &Arc<EntityClass>) -> Arc<EntityClass> {
    EntityClass::builder("FooList")
        .list()
        .field(TypedField::new("Foo").with_type(foo).multiple())
        .build()
        .unwrap()
}

pub fn foo(class: &Arc<EntityClass>, name: &str) -> Entity {
    Entity::new(class).with("name", name).unwrap()
}

/// Class with one untyped single and one untyped multiple field
pub fn single_and_multiple_class() -> Arc<EntityClass> {
    EntityClass::builder("SomeEntity")
        .binding_class("Mock")
        .field(TypedField::new("Single"))
        .field(TypedField::new("Multiple").multiple())
        .build()
        .unwrap()
}

/// Comparable scalar fields of every kind, for round-trip properties
pub fn scalar_record_class() -> Arc<EntityClass> {
    EntityClass::builder("Record")
        .field(TypedField::new("Label").with_type(ScalarKind::String))
        .field(TypedField::new("Count").with_type(ScalarKind::Integer))
        .field(TypedField::new("Enabled").with_type(ScalarKind::Boolean))
        .field(TypedField::new("Tags").with_type(ScalarKind::String).multiple())
        .build()
        .unwrap()
}

/// `A <- B <- C`, bound to the XML Schema, XML Schema instance and XLink
/// namespaces, each with an `alias:Type` xsi:type
pub fn abc_classes() -> (Arc<EntityClass>, Arc<EntityClass>, Arc<EntityClass>) {
    let a = EntityClass::builder("A")
        .namespace(NS_XML_SCHEMA.uri())
        .xsi_type("a:AType")
        .build()
        .unwrap();
    let b = EntityClass::builder("B")
        .parent(&a)
        .namespace(NS_XML_SCHEMA_INSTANCE.uri())
        .xsi_type("b:BType")
        .build()
        .unwrap();
    let c = EntityClass::builder("C")
        .parent(&b)
        .namespace(NS_XLINK.uri())
        .xsi_type("c:CType")
        .build()
        .unwrap();
    (a, b, c)
}

pub fn test_nsmap() -> IndexMap<String, String> {
    ordered_map(&[("test:a", "a"), ("test:b", "b"), ("test:c", "c")])
}

pub fn test_schemalocs() -> IndexMap<String, String> {
    ordered_map(&[
        ("test:a", "/dev/null"),
        ("test:b", "/dev/null"),
        ("test:c", "/dev/null"),
    ])
}

/// Collector context over the global registry, independent of the global id generator
pub fn test_context() -> CollectorContext {
    CollectorContext::new(registry::snapshot(), EXAMPLE_NAMESPACE.clone())
}

// ── collaborator doubles ───────────────────────────────────────────

/// In-memory parsed document
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub nsmap: IndexMap<String, String>,
    pub binding: BindingValue,
}

impl MockDocument {
    pub fn new(tag: &str, root: BindingObject) -> Self {
        Self {
            tag: tag.to_string(),
            binding: BindingValue::Object(root),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.nsmap.insert(prefix.to_string(), uri.to_string());
        self
    }
}

impl XmlDocument for MockDocument {
    fn root_tag(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn nsmap(&self) -> IndexMap<String, String> {
        self.nsmap.clone()
    }

    fn to_binding(&self) -> Result<BindingValue> {
        if self.binding.is_null() {
            return Err(EntityError::collaborator("empty document"));
        }
        Ok(self.binding.clone())
    }
}

/// Writer recording what it was handed
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub calls: RefCell<Vec<(BindingObject, String, bool)>>,
}

impl RecordingWriter {
    pub fn last_namespace_def(&self) -> Option<String> {
        self.calls.borrow().last().map(|(_, ns, _)| ns.clone())
    }
}

impl XmlWriter for RecordingWriter {
    fn write(&self, root: &BindingObject, namespace_def: &str, pretty: bool) -> Result<String> {
        self.calls
            .borrow_mut()
            .push((root.clone(), namespace_def.to_string(), pretty));
        Ok(format!("<{} {namespace_def}/>", root.class_name()))
    }
}
