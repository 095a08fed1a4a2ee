//! Process-wide namespace registry
//!
//! A single [`NamespaceSet`] holding every namespace known to the process,
//! seeded with the well-known XML namespaces. Per-document work should take a
//! [`snapshot`] or a [`make_namespace_subset_from_uris`] copy and operate on
//! that value instead of the shared registry.

use crate::error::NamespaceResult;
use crate::namespace::Namespace;
use crate::set::{NamespaceSet, XmlnsOptions};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// XLink
pub static NS_XLINK: Lazy<Namespace> =
    Lazy::new(|| Namespace::new("http://www.w3.org/1999/xlink", Some("xlink"), None));

/// XML digital signatures
pub static NS_XML_DSIG: Lazy<Namespace> =
    Lazy::new(|| Namespace::new("http://www.w3.org/2000/09/xmldsig#", Some("ds"), None));

/// XML Schema
pub static NS_XML_SCHEMA: Lazy<Namespace> =
    Lazy::new(|| Namespace::new("http://www.w3.org/2001/XMLSchema", Some("xs"), None));

/// XML Schema instance
pub static NS_XML_SCHEMA_INSTANCE: Lazy<Namespace> = Lazy::new(|| {
    Namespace::new("http://www.w3.org/2001/XMLSchema-instance", Some("xsi"), None)
});

fn well_known() -> [&'static Namespace; 4] {
    [&*NS_XLINK, &*NS_XML_DSIG, &*NS_XML_SCHEMA, &*NS_XML_SCHEMA_INSTANCE]
}

fn build_xml_namespaces() -> NamespaceResult<NamespaceSet> {
    let mut set = NamespaceSet::new();
    for ns in well_known() {
        set.add_namespace(ns)?;
    }
    Ok(set)
}

fn seeded_xml_namespaces() -> NamespaceSet {
    build_xml_namespaces().expect("well-known namespaces have distinct uris and prefixes")
}

static XML_NAMESPACES: Lazy<NamespaceSet> = Lazy::new(seeded_xml_namespaces);

static ALL_NAMESPACES: Lazy<RwLock<NamespaceSet>> =
    Lazy::new(|| RwLock::new(seeded_xml_namespaces()));

/// Namespaces every serialized document declares
#[inline]
#[must_use]
pub fn xml_namespaces() -> &'static NamespaceSet {
    &XML_NAMESPACES
}

/// Register a namespace with the process-wide registry
///
/// # Errors
/// Fails as [`NamespaceSet::add_namespace`] does; the registry is then unchanged.
pub fn register_namespace(ns: &Namespace) -> NamespaceResult<()> {
    ALL_NAMESPACES.write().add_namespace(ns)
}

/// Preferred prefix registered for `uri`
///
/// # Errors
/// [`NamespaceError::NamespaceNotFound`](crate::NamespaceError::NamespaceNotFound)
/// if `uri` was never registered
pub fn lookup_name(uri: &str) -> NamespaceResult<Option<String>> {
    Ok(ALL_NAMESPACES
        .read()
        .preferred_prefix_for_namespace(uri)?
        .map(str::to_string))
}

/// Namespace uri registered for `prefix`
#[must_use]
pub fn lookup_prefix(prefix: &str) -> Option<String> {
    ALL_NAMESPACES
        .read()
        .namespace_for_prefix(prefix)
        .map(str::to_string)
}

/// Copy of the registry limited to the given namespaces
///
/// # Errors
/// [`NamespaceError::NamespaceNotFound`](crate::NamespaceError::NamespaceNotFound)
/// if any uri was never registered
pub fn make_namespace_subset_from_uris<S: AsRef<str>>(uris: &[S]) -> NamespaceResult<NamespaceSet> {
    ALL_NAMESPACES.read().subset(uris)
}

/// Copy of the whole registry
#[must_use]
pub fn snapshot() -> NamespaceSet {
    ALL_NAMESPACES.read().clone()
}

/// uri -> prefix for every registered namespace
///
/// # Errors
/// [`NamespaceError::NoPrefixes`](crate::NamespaceError::NoPrefixes) if a
/// registered namespace has no prefix
pub fn get_full_ns_map() -> NamespaceResult<IndexMap<String, String>> {
    ALL_NAMESPACES.read().uri_to_prefix_map()
}

/// prefix -> uri for every registered namespace
///
/// # Errors
/// [`NamespaceError::NoPrefixes`](crate::NamespaceError::NoPrefixes) if a
/// registered namespace has no prefix
pub fn get_full_prefix_map() -> NamespaceResult<IndexMap<String, String>> {
    ALL_NAMESPACES.read().prefix_to_uri_map()
}

/// uri -> schema location for every registered namespace that has one
#[must_use]
pub fn get_full_schemaloc_map() -> IndexMap<String, String> {
    ALL_NAMESPACES.read().uri_schemaloc_map()
}

/// `xmlns` declarations for the given registered namespaces, or all when `uris` is empty
///
/// # Errors
/// Fails as [`NamespaceSet::render_xmlns_for`] does
pub fn get_xmlns_string<S: AsRef<str>>(uris: &[S], sort: bool) -> NamespaceResult<String> {
    let registry = ALL_NAMESPACES.read();
    let options = XmlnsOptions::new().sorted(sort);
    if uris.is_empty() {
        registry.render_xmlns(&options)
    } else {
        registry.render_xmlns_for(uris, &options)
    }
}

/// `xsi:schemaLocation` attribute for the given registered namespaces, or all when `uris` is empty
///
/// # Errors
/// [`NamespaceError::NamespaceNotFound`](crate::NamespaceError::NamespaceNotFound)
/// if any uri was never registered
pub fn get_schemaloc_string<S: AsRef<str>>(uris: &[S], sort: bool) -> NamespaceResult<String> {
    let registry = ALL_NAMESPACES.read();
    if uris.is_empty() {
        Ok(registry.render_schema_location(sort, "\n"))
    } else {
        registry.render_schema_location_for(uris, sort, "\n")
    }
}
