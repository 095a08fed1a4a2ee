//! Namespace collection during serialization
//!
//! A [`NamespaceCollector`] is fed every entity visited by
//! [`Entity::to_obj_with`](crate::Entity::to_obj_with). It remembers each
//! visited class and its ancestors, plus any namespaces and schema locations
//! recovered from a parsed source document. [`NamespaceCollector::finalize`]
//! turns that into a per-document [`NamespaceSet`] in which every namespace
//! has a preferred prefix.
//!
//! Finalization order:
//! 1. Class namespaces, subset from the registry, with class aliases filling
//!    in missing preferred prefixes
//! 2. Caller overrides (uri → prefix)
//! 3. The id namespace
//! 4. Namespaces of the source document
//! 5. The XML namespaces
//! 6. A preferred prefix elected for every namespace still lacking one
//! 7. Schema locations: overrides win over the source document's, and only
//!    fill namespaces without one

use crate::class::EntityClass;
use crate::entity::Entity;
use crate::error::Result;
use crate::idgen::{self, EXAMPLE_NAMESPACE};
use ctibind_namespace::{registry, Namespace, NamespaceError, NamespaceSet, XmlnsOptions};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::{debug, warn};

const EXAMPLE_PREFIX: &str = "example";

/// Explicit inputs to [`NamespaceCollector::finalize`]
#[derive(Debug, Clone)]
pub struct CollectorContext {
    /// Every known namespace; class namespaces are looked up here
    pub registry: NamespaceSet,
    /// Namespace of generated ids, declared in every document
    pub id_namespace: Namespace,
    /// Namespaces every document declares
    pub xml_namespaces: NamespaceSet,
}

impl CollectorContext {
    /// Context over `registry` with the standard XML namespaces
    #[must_use]
    pub fn new(registry: NamespaceSet, id_namespace: Namespace) -> Self {
        Self {
            registry,
            id_namespace,
            xml_namespaces: registry::xml_namespaces().clone(),
        }
    }

    /// Snapshot of the process-wide namespace registry and id namespace
    #[must_use]
    pub fn from_globals() -> Self {
        Self::new(registry::snapshot(), idgen::id_namespace())
    }
}

/// Harvests namespace metadata from visited entities
#[derive(Debug, Clone, Default)]
pub struct NamespaceCollector {
    collected_classes: IndexMap<usize, Arc<EntityClass>>,
    input_namespaces: IndexMap<String, String>,
    input_schemalocs: IndexMap<String, String>,
    collected_namespaces: Option<NamespaceSet>,
    finalized_schemalocs: Option<IndexMap<String, String>>,
    binding_namespaces: Option<IndexMap<String, String>>,
}

impl NamespaceCollector {
    /// Create empty collector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entity's class chain and source-document metadata
    pub fn collect(&mut self, entity: &Entity) {
        for class in entity.class().ancestry() {
            self.collected_classes
                .entry(Arc::as_ptr(class) as usize)
                .or_insert_with(|| Arc::clone(class));
        }

        self.input_namespaces.extend(
            entity
                .input_namespaces()
                .iter()
                .map(|(prefix, uri)| (prefix.clone(), uri.clone())),
        );
        self.input_schemalocs.extend(
            entity
                .input_schemalocations()
                .iter()
                .map(|(uri, loc)| (uri.clone(), loc.clone())),
        );
    }

    /// Merge another collector's classes and source-document metadata
    pub fn update(&mut self, other: &NamespaceCollector) {
        for (key, class) in &other.collected_classes {
            self.collected_classes
                .entry(*key)
                .or_insert_with(|| Arc::clone(class));
        }
        self.input_namespaces.extend(
            other
                .input_namespaces
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.input_schemalocs.extend(
            other
                .input_schemalocs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    /// Classes seen so far, each once
    pub fn collected_classes(&self) -> impl Iterator<Item = &Arc<EntityClass>> {
        self.collected_classes.values()
    }

    /// Prefix → uri pairs from source documents
    #[inline]
    #[must_use]
    pub fn input_namespaces(&self) -> &IndexMap<String, String> {
        &self.input_namespaces
    }

    /// Uri → location pairs from source documents
    #[inline]
    #[must_use]
    pub fn input_schemalocs(&self) -> &IndexMap<String, String> {
        &self.input_schemalocs
    }

    /// Whether [`NamespaceCollector::finalize`] has succeeded
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.collected_namespaces.is_some()
    }

    /// The finalized per-document namespace set
    #[inline]
    #[must_use]
    pub fn collected_namespaces(&self) -> Option<&NamespaceSet> {
        self.collected_namespaces.as_ref()
    }

    /// Uri → prefix map handed to the binding layer
    #[inline]
    #[must_use]
    pub fn binding_namespaces(&self) -> Option<&IndexMap<String, String>> {
        self.binding_namespaces.as_ref()
    }

    /// Uri → schema location for every namespace that has one
    #[inline]
    #[must_use]
    pub fn finalized_schemalocs(&self) -> Option<&IndexMap<String, String>> {
        self.finalized_schemalocs.as_ref()
    }

    /// Build the per-document namespace set
    ///
    /// `ns_dict` maps uri → prefix and `schemaloc_dict` uri → location; both
    /// are caller overrides. On error the collector's finalized state is
    /// left as it was.
    ///
    /// # Errors
    /// - [`NamespaceError::NamespaceNotFound`] if a class namespace isn't in the registry
    /// - [`NamespaceError::DuplicatePrefix`] if two sources bind one prefix to different uris
    /// - [`NamespaceError::NoPrefixes`] if a namespace has no prefix anywhere
    pub fn finalize(
        &mut self,
        ctx: &CollectorContext,
        ns_dict: &IndexMap<String, String>,
        schemaloc_dict: &IndexMap<String, String>,
    ) -> Result<()> {
        let mut nsset = self.parse_collected_classes(ctx)?;
        self.finalize_namespaces(&mut nsset, ctx, ns_dict)?;
        self.finalize_schemalocs(&mut nsset, ctx, schemaloc_dict)?;

        let binding_namespaces = nsset.uri_to_prefix_map()?;
        let finalized_schemalocs = nsset.uri_schemaloc_map();

        debug!(
            classes = self.collected_classes.len(),
            namespaces = nsset.len(),
            schemalocs = finalized_schemalocs.len(),
            "finalized namespace collector"
        );

        self.collected_namespaces = Some(nsset);
        self.binding_namespaces = Some(binding_namespaces);
        self.finalized_schemalocs = Some(finalized_schemalocs);
        Ok(())
    }

    /// Namespaces declared by the collected classes
    fn parse_collected_classes(&self, ctx: &CollectorContext) -> Result<NamespaceSet> {
        let mut alias_to_uri: IndexMap<&str, &str> = IndexMap::new();
        let mut noalias: IndexSet<&str> = IndexSet::new();

        // Namespace, alias and xsi:type are inherited when a class leaves them unset.
        for class in self.collected_classes.values() {
            let Some(uri) = class.ancestry().find_map(|c| c.namespace()) else {
                continue;
            };

            if let Some(alias) = class.ancestry().find_map(|c| c.xsi_ns()) {
                alias_to_uri.insert(alias, uri);
                continue;
            }

            let xsi_type = class.ancestry().find_map(|c| c.xsi_type());
            match xsi_type.and_then(|qname| qname.split_once(':')) {
                Some((alias, name)) if !name.contains(':') => {
                    alias_to_uri.insert(alias, uri);
                }
                _ => {
                    noalias.insert(uri);
                }
            }
        }

        let uris: Vec<&str> = alias_to_uri
            .values()
            .copied()
            .chain(noalias.iter().copied())
            .collect();
        let mut nsset = ctx.registry.subset(&uris)?;

        for (alias, uri) in &alias_to_uri {
            if nsset.preferred_prefix_for_namespace(uri)?.is_none() {
                nsset.set_preferred_prefix_for_namespace(uri, Some(*alias), true)?;
            }
        }
        Ok(nsset)
    }

    fn finalize_namespaces(
        &self,
        nsset: &mut NamespaceSet,
        ctx: &CollectorContext,
        ns_dict: &IndexMap<String, String>,
    ) -> Result<()> {
        for (uri, prefix) in ns_dict {
            nsset.add_namespace_uri(uri, Some(prefix), None)?;
        }

        let id_ns = &ctx.id_namespace;
        nsset.add_namespace_uri(id_ns.uri(), id_ns.prefix(), None)?;

        let mut input_namespaces = self.input_namespaces.clone();
        if id_ns.prefix() == Some(EXAMPLE_PREFIX) {
            if let Some(uri) = input_namespaces.get_mut(EXAMPLE_PREFIX) {
                EXAMPLE_NAMESPACE.uri().clone_into(uri);
            }
        }
        for (prefix, uri) in &input_namespaces {
            nsset.add_namespace_uri(uri, Some(prefix), None)?;
        }

        nsset.import_from(&ctx.xml_namespaces, false)?;

        let uris: Vec<String> = nsset.namespace_uris().map(str::to_string).collect();
        for uri in &uris {
            if nsset.preferred_prefix_for_namespace(uri)?.is_some() {
                continue;
            }

            let prefix = match nsset.get_prefixes(uri)?.first() {
                Some(prefix) => Some(prefix.clone()),
                None => registry_prefix(&ctx.registry, uri)?,
            };
            let Some(prefix) = prefix else {
                return Err(NamespaceError::NoPrefixes { uri: uri.clone() }.into());
            };

            nsset.set_preferred_prefix_for_namespace(uri, Some(&prefix), true)?;
        }
        Ok(())
    }

    fn finalize_schemalocs(
        &self,
        nsset: &mut NamespaceSet,
        ctx: &CollectorContext,
        schemaloc_dict: &IndexMap<String, String>,
    ) -> Result<()> {
        let mut merged = schemaloc_dict.clone();
        for (uri, loc) in &self.input_schemalocs {
            merged.entry(uri.clone()).or_insert_with(|| loc.clone());
        }

        for (uri, loc) in &merged {
            if nsset.contains_namespace(uri) && nsset.get_schema_location(uri)?.is_none() {
                nsset.set_schema_location(uri, Some(loc), false)?;
            }
        }

        let id_uri = ctx.id_namespace.uri();
        for uri in nsset.namespace_uris() {
            if nsset.get_schema_location(uri)?.is_some() {
                continue;
            }
            if uri == id_uri || ctx.xml_namespaces.contains_namespace(uri) || merged.contains_key(uri) {
                continue;
            }
            warn!(namespace = uri, "unable to map namespace to a schemaLocation");
        }
        Ok(())
    }

    /// `xmlns` declarations for every prefix of every finalized namespace
    ///
    /// Empty before finalization.
    ///
    /// # Errors
    /// As [`NamespaceSet::render_xmlns`]
    pub fn xmlns_string(&self, delim: &str) -> Result<String> {
        let Some(nsset) = &self.collected_namespaces else {
            return Ok(String::new());
        };
        let options = XmlnsOptions::new().with_all_prefixes().with_delim(delim);
        Ok(nsset.render_xmlns(&options)?)
    }

    /// `xsi:schemaLocation` attribute for the finalized namespaces
    ///
    /// Empty before finalization or when no namespace has a location.
    #[must_use]
    pub fn schema_location_string(&self, delim: &str) -> String {
        self.collected_namespaces
            .as_ref()
            .map(|nsset| nsset.render_schema_location(false, delim))
            .unwrap_or_default()
    }
}

/// Preferred prefix the registry holds for `uri`, if it knows the namespace
fn registry_prefix(registry: &NamespaceSet, uri: &str) -> Result<Option<String>> {
    if !registry.contains_namespace(uri) {
        return Ok(None);
    }
    Ok(registry
        .preferred_prefix_for_namespace(uri)?
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TypedField;

    const NS_A: &str = "urn:test:a";
    const NS_B: &str = "urn:test:b";

    fn context() -> CollectorContext {
        let mut registry = NamespaceSet::new();
        registry.add_namespace_uri(NS_A, Some("a"), Some("a.xsd")).unwrap();
        registry.add_namespace_uri(NS_B, None, None).unwrap();
        CollectorContext::new(registry, EXAMPLE_NAMESPACE.clone())
    }

    fn classes() -> (Arc<EntityClass>, Arc<EntityClass>) {
        let a = EntityClass::builder("A")
            .namespace(NS_A)
            .field(TypedField::new("Name"))
            .build()
            .unwrap();
        let b = EntityClass::builder("B")
            .parent(&a)
            .namespace(NS_B)
            .xsi_type("bee:BType")
            .build()
            .unwrap();
        (a, b)
    }

    #[test]
    fn collect_walks_ancestry_once() {
        let (a, b) = classes();
        let mut collector = NamespaceCollector::new();
        collector.collect(&Entity::new(&b));
        collector.collect(&Entity::new(&b));
        collector.collect(&Entity::new(&a));

        let names: Vec<&str> = collector.collected_classes().map(|c| c.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn subclass_inherits_namespace() {
        let parent = EntityClass::builder("Parent")
            .namespace(NS_B)
            .field(TypedField::new("Name"))
            .build()
            .unwrap();
        let child = EntityClass::builder("Child")
            .parent(&parent)
            .xsi_type("bee:ChildType")
            .build()
            .unwrap();

        let mut collector = NamespaceCollector::new();
        collector.collect(&Entity::new(&child));
        collector
            .finalize(&context(), &IndexMap::new(), &IndexMap::new())
            .unwrap();

        let binding = collector.binding_namespaces().unwrap();
        assert_eq!(binding.get(NS_B).map(String::as_str), Some("bee"));
    }

    #[test]
    fn finalize_elects_prefixes() {
        let (_, b) = classes();
        let mut collector = NamespaceCollector::new();
        collector.collect(&Entity::new(&b));
        assert!(!collector.is_finalized());
        assert_eq!(collector.xmlns_string(" ").unwrap(), "");

        collector
            .finalize(&context(), &IndexMap::new(), &IndexMap::new())
            .unwrap();

        let binding = collector.binding_namespaces().unwrap();
        assert_eq!(binding.get(NS_A).map(String::as_str), Some("a"));
        assert_eq!(binding.get(NS_B).map(String::as_str), Some("bee"));
        assert_eq!(binding.get("http://example.com").map(String::as_str), Some("example"));
        assert_eq!(binding.get("http://www.w3.org/2001/XMLSchema-instance").map(String::as_str), Some("xsi"));

        let schemalocs = collector.finalized_schemalocs().unwrap();
        assert_eq!(schemalocs.get(NS_A).map(String::as_str), Some("a.xsd"));
        assert!(collector.collected_namespaces().unwrap().is_valid());
    }

    #[test]
    fn unknown_class_namespace_fails() {
        let class = EntityClass::builder("Stray")
            .namespace("urn:never:registered")
            .build()
            .unwrap();
        let mut collector = NamespaceCollector::new();
        collector.collect(&Entity::new(&class));

        let err = collector
            .finalize(&context(), &IndexMap::new(), &IndexMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::EntityError::Namespace(NamespaceError::NamespaceNotFound { .. })
        ));
        assert!(!collector.is_finalized());
    }

    #[test]
    fn example_prefix_is_remapped() {
        let (a, _) = classes();
        let mut entity = Entity::new(&a);
        entity.add_input_namespace("example", "http://example.com/");

        let mut collector = NamespaceCollector::new();
        collector.collect(&entity);
        collector
            .finalize(&context(), &IndexMap::new(), &IndexMap::new())
            .unwrap();

        let nsset = collector.collected_namespaces().unwrap();
        assert!(!nsset.contains_namespace("http://example.com/"));
        assert_eq!(nsset.namespace_for_prefix("example"), Some("http://example.com"));
    }

    #[test]
    fn schemaloc_overrides_win() {
        let (a, _) = classes();
        let mut entity = Entity::new(&a);
        entity.add_input_namespace("other", "urn:test:other");
        entity.add_input_schemalocation("urn:test:other", "parsed.xsd");

        let mut collector = NamespaceCollector::new();
        collector.collect(&entity);

        let overrides: IndexMap<String, String> =
            [("urn:test:other".to_string(), "override.xsd".to_string())].into_iter().collect();
        collector
            .finalize(&context(), &IndexMap::new(), &overrides)
            .unwrap();

        assert_eq!(
            collector.finalized_schemalocs().unwrap().get("urn:test:other").map(String::as_str),
            Some("override.xsd")
        );
        assert!(collector
            .schema_location_string(" ")
            .contains("urn:test:other override.xsd"));
    }

    #[test]
    fn update_merges_inputs() {
        let (a, b) = classes();
        let mut first = NamespaceCollector::new();
        first.collect(&Entity::new(&a));

        let mut entity = Entity::new(&b);
        entity.add_input_namespace("x", "urn:x");
        let mut second = NamespaceCollector::new();
        second.collect(&entity);

        first.update(&second);
        assert_eq!(first.collected_classes().count(), 2);
        assert_eq!(first.input_namespaces().get("x").map(String::as_str), Some("urn:x"));
    }
}
