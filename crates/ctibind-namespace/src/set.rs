//! Namespace registry with conflict detection
//!
//! Provides [`NamespaceSet`], a registry of XML namespace URIs with their
//! prefixes, preferred prefix and schema location.
//!
//! # Invariants
//! - Every key of the uri map equals its info's `uri`
//! - Every prefix in an info's prefix set maps back to that info's uri
//! - A prefix maps to at most one namespace
//! - The empty prefix never appears in the prefix map
//!
//! All merging operations clone the affected state, mutate the clone and swap
//! it in only once the whole operation has succeeded.

use crate::error::{NamespaceError, NamespaceResult};
use crate::namespace::Namespace;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Per-uri record owned by exactly one [`NamespaceSet`]
///
/// `preferred_prefix` is `None` (prefer default rendering) or a member of
/// `prefixes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamespaceInfo {
    uri: String,
    prefixes: IndexSet<String>,
    preferred_prefix: Option<String>,
    schema_location: Option<String>,
}

impl NamespaceInfo {
    /// The given prefix (if any) becomes both a member and the preferred prefix
    fn new(uri: &str, prefix: Option<&str>, schema_location: Option<&str>) -> Self {
        let prefix = non_empty(prefix);
        let mut prefixes = IndexSet::new();
        if let Some(p) = prefix {
            prefixes.insert(p.to_string());
        }

        Self {
            uri: uri.to_string(),
            prefixes,
            preferred_prefix: prefix.map(str::to_string),
            schema_location: non_empty(schema_location).map(str::to_string),
        }
    }

    /// Preferred prefix, else the first registered one
    fn any_prefix(&self) -> Option<&str> {
        self.preferred_prefix
            .as_deref()
            .or_else(|| self.prefixes.first().map(String::as_str))
    }

    /// Merge an incoming schema location into this record
    fn merge_schema_location(&mut self, incoming: Option<&str>) -> NamespaceResult<()> {
        let Some(loc) = non_empty(incoming) else {
            return Ok(());
        };

        match &self.schema_location {
            None => {
                self.schema_location = Some(loc.to_string());
                Ok(())
            }
            Some(current) if current == loc => Ok(()),
            Some(current) => Err(NamespaceError::ConflictingSchemaLocation {
                uri: self.uri.clone(),
                existing: current.clone(),
                incoming: loc.to_string(),
            }),
        }
    }
}

impl Display for NamespaceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<&str> = self.prefixes.iter().map(String::as_str).collect();
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "  [{}]", prefixes.join(", "))?;
        writeln!(
            f,
            "  preferred: {}",
            self.preferred_prefix.as_deref().unwrap_or("(default)")
        )?;
        write!(f, "  {}", self.schema_location.as_deref().unwrap_or("(none)"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Options for [`NamespaceSet::render_xmlns`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlnsOptions {
    /// Render namespaces in sorted uri order instead of insertion order
    pub sort: bool,
    /// Declare only the preferred prefix of each namespace
    pub preferred_only: bool,
    /// Separator between declarations
    pub delim: String,
}

impl XmlnsOptions {
    /// Default options: insertion order, preferred prefixes only, newline delimiter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With sorted uri order
    #[inline]
    #[must_use]
    pub fn sorted(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    /// Declare every registered prefix rather than only the preferred one
    #[inline]
    #[must_use]
    pub fn with_all_prefixes(mut self) -> Self {
        self.preferred_only = false;
        self
    }

    /// With a custom delimiter
    #[inline]
    #[must_use]
    pub fn with_delim(mut self, delim: impl Into<String>) -> Self {
        self.delim = delim.into();
        self
    }
}

impl Default for XmlnsOptions {
    fn default() -> Self {
        Self {
            sort: false,
            preferred_only: true,
            delim: "\n".to_string(),
        }
    }
}

/// A set of XML namespaces
///
/// Each namespace has a set of prefixes, a preferred prefix and an optional
/// schema location. A preferred prefix of `None` means the namespace would
/// like to be the document's default namespace; rendering resolves competing
/// preferences deterministically (see [`NamespaceSet::render_xmlns`]).
#[derive(Debug, Clone, Default)]
pub struct NamespaceSet {
    /// uri -> info, in registration order
    uri_map: IndexMap<String, NamespaceInfo>,
    /// prefix -> owning uri
    prefix_map: HashMap<String, String>,
}

impl NamespaceSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup_uri(&self, uri: &str) -> NamespaceResult<&NamespaceInfo> {
        self.uri_map
            .get(uri)
            .ok_or_else(|| NamespaceError::not_found(uri))
    }

    fn lookup_uri_mut(&mut self, uri: &str) -> NamespaceResult<&mut NamespaceInfo> {
        self.uri_map
            .get_mut(uri)
            .ok_or_else(|| NamespaceError::not_found(uri))
    }

    /// Insert an info without conflict checks; callers check first
    fn insert_info(&mut self, info: NamespaceInfo) {
        for prefix in &info.prefixes {
            self.prefix_map.insert(prefix.clone(), info.uri.clone());
        }
        self.uri_map.insert(info.uri.clone(), info);
    }

    /// Fail if `prefix` is already bound to a namespace other than `owner_uri`
    fn check_prefix_conflict(&self, owner_uri: &str, prefix: &str) -> NamespaceResult<()> {
        match self.prefix_map.get(prefix) {
            Some(existing) if existing != owner_uri => Err(NamespaceError::duplicate_prefix(
                prefix, existing, owner_uri,
            )),
            _ => Ok(()),
        }
    }

    /// Whether `uri` is in this set
    #[inline]
    #[must_use]
    pub fn contains_namespace(&self, uri: &str) -> bool {
        self.uri_map.contains_key(uri)
    }

    /// Namespace the given prefix maps to, if any
    #[must_use]
    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefix_map.get(prefix).map(String::as_str)
    }

    /// Preferred prefix of `uri`; `None` means "prefer default namespace"
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    pub fn preferred_prefix_for_namespace(&self, uri: &str) -> NamespaceResult<Option<&str>> {
        Ok(self.lookup_uri(uri)?.preferred_prefix.as_deref())
    }

    /// Set the preferred prefix of `uri`
    ///
    /// Setting `None` always succeeds. A prefix not registered for `uri` is
    /// added first when `add_if_missing` is set, otherwise it is an error.
    ///
    /// # Errors
    /// - [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    /// - [`NamespaceError::PrefixNotFound`] for an unknown prefix without `add_if_missing`
    /// - [`NamespaceError::DuplicatePrefix`] if the added prefix maps elsewhere
    pub fn set_preferred_prefix_for_namespace(
        &mut self,
        uri: &str,
        prefix: Option<&str>,
        add_if_missing: bool,
    ) -> NamespaceResult<()> {
        let info = self.lookup_uri_mut(uri)?;

        let Some(p) = non_empty(prefix) else {
            info.preferred_prefix = None;
            return Ok(());
        };

        if info.prefixes.contains(p) {
            info.preferred_prefix = Some(p.to_string());
            Ok(())
        } else if add_if_missing {
            self.add_prefix(uri, p, true)
        } else {
            Err(NamespaceError::PrefixNotFound {
                prefix: p.to_string(),
            })
        }
    }

    /// Add a namespace from a [`Namespace`] triple
    ///
    /// # Errors
    /// See [`NamespaceSet::add_namespace_uri`]
    pub fn add_namespace(&mut self, ns: &Namespace) -> NamespaceResult<()> {
        self.add_namespace_uri(ns.uri(), ns.prefix(), ns.schema_location())
    }

    /// Add a namespace, or merge into an existing one
    ///
    /// A new namespace takes `prefix` as its preferred prefix (or prefers
    /// default rendering when `prefix` is `None`). For an existing namespace
    /// the prefix joins the prefix set without changing the preference, and
    /// the schema location fills in a missing one.
    ///
    /// # Errors
    /// - [`NamespaceError::DuplicatePrefix`] if `prefix` maps to a different namespace
    /// - [`NamespaceError::ConflictingSchemaLocation`] if both locations are set and differ
    ///
    /// On error the set is unchanged.
    pub fn add_namespace_uri(
        &mut self,
        uri: &str,
        prefix: Option<&str>,
        schema_location: Option<&str>,
    ) -> NamespaceResult<()> {
        debug_assert!(!uri.is_empty(), "namespace uri must be non-empty");
        let prefix = non_empty(prefix);

        if let Some(existing) = self.uri_map.get(uri) {
            let mut staged = existing.clone();

            if let Some(p) = prefix {
                self.check_prefix_conflict(uri, p)?;
                staged.prefixes.insert(p.to_string());
            }
            staged.merge_schema_location(schema_location)?;

            self.insert_info(staged);
        } else {
            if let Some(p) = prefix {
                self.check_prefix_conflict(uri, p)?;
            }
            self.insert_info(NamespaceInfo::new(uri, prefix, schema_location));
        }

        Ok(())
    }

    /// Remove a namespace and all its prefixes; no-op if absent
    pub fn remove_namespace(&mut self, uri: &str) {
        if let Some(info) = self.uri_map.shift_remove(uri) {
            for prefix in &info.prefixes {
                self.prefix_map.remove(prefix);
            }
        }
    }

    /// Add a prefix to an existing namespace
    ///
    /// # Errors
    /// - [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    /// - [`NamespaceError::DuplicatePrefix`] if `prefix` maps to a different namespace
    pub fn add_prefix(&mut self, uri: &str, prefix: &str, set_as_preferred: bool) -> NamespaceResult<()> {
        debug_assert!(!prefix.is_empty(), "use set_preferred_prefix_for_namespace(None) for defaults");
        if prefix.is_empty() {
            return Ok(());
        }

        self.lookup_uri(uri)?;
        self.check_prefix_conflict(uri, prefix)?;

        let info = self.lookup_uri_mut(uri)?;
        info.prefixes.insert(prefix.to_string());
        if set_as_preferred {
            info.preferred_prefix = Some(prefix.to_string());
        }
        self.prefix_map.insert(prefix.to_string(), uri.to_string());

        Ok(())
    }

    /// Copy of the prefix set for `uri`
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    pub fn get_prefixes(&self, uri: &str) -> NamespaceResult<IndexSet<String>> {
        Ok(self.lookup_uri(uri)?.prefixes.clone())
    }

    /// Iterate the prefixes of `uri` in registration order
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    pub fn prefix_iter(&self, uri: &str) -> NamespaceResult<impl Iterator<Item = &str>> {
        Ok(self.lookup_uri(uri)?.prefixes.iter().map(String::as_str))
    }

    /// Remove a prefix; no-op if absent
    ///
    /// If it was the preferred prefix, the first remaining prefix becomes
    /// preferred, or `None` when none remain.
    pub fn remove_prefix(&mut self, prefix: &str) {
        let Some(uri) = self.prefix_map.remove(prefix) else {
            return;
        };

        if let Some(info) = self.uri_map.get_mut(&uri) {
            info.prefixes.shift_remove(prefix);
            if info.preferred_prefix.as_deref() == Some(prefix) {
                info.preferred_prefix = info.prefixes.first().cloned();
            }
        }
    }

    /// Schema location of `uri`, if one is set
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    pub fn get_schema_location(&self, uri: &str) -> NamespaceResult<Option<&str>> {
        Ok(self.lookup_uri(uri)?.schema_location.as_deref())
    }

    /// Set the schema location of `uri`
    ///
    /// Replaces unconditionally when `replace` is set or no location exists.
    /// Setting `None` clears the location and is not a conflict.
    ///
    /// # Errors
    /// - [`NamespaceError::NamespaceNotFound`] if `uri` isn't in this set
    /// - [`NamespaceError::ConflictingSchemaLocation`] for a differing location without `replace`
    pub fn set_schema_location(
        &mut self,
        uri: &str,
        schema_location: Option<&str>,
        replace: bool,
    ) -> NamespaceResult<()> {
        let info = self.lookup_uri_mut(uri)?;
        let incoming = non_empty(schema_location).map(str::to_string);

        let conflicting = match (&info.schema_location, &incoming) {
            (Some(current), Some(loc)) => !replace && current != loc,
            _ => false,
        };

        if conflicting {
            return Err(NamespaceError::ConflictingSchemaLocation {
                uri: uri.to_string(),
                existing: info.schema_location.clone().unwrap_or_default(),
                incoming: incoming.unwrap_or_default(),
            });
        }

        info.schema_location = incoming;
        Ok(())
    }

    /// Render `xmlns` declarations for every namespace in this set
    ///
    /// # Errors
    /// See [`NamespaceSet::render_xmlns_for`]
    pub fn render_xmlns(&self, options: &XmlnsOptions) -> NamespaceResult<String> {
        let uris: Vec<&str> = self.namespace_uris().collect();
        self.render_xmlns_inner(uris, options)
    }

    /// Render `xmlns` declarations for the given namespaces
    ///
    /// The first namespace preferring default rendering becomes the
    /// document's default namespace. Each later one is declared with its
    /// first registered prefix instead.
    ///
    /// # Errors
    /// - [`NamespaceError::NamespaceNotFound`] if a uri isn't in this set
    /// - [`NamespaceError::TooManyDefaultNamespaces`] if a later default-preferring
    ///   namespace has no prefix to fall back on
    pub fn render_xmlns_for<S: AsRef<str>>(
        &self,
        uris: &[S],
        options: &XmlnsOptions,
    ) -> NamespaceResult<String> {
        let uris: Vec<&str> = uris.iter().map(AsRef::as_ref).collect();
        self.render_xmlns_inner(uris, options)
    }

    fn render_xmlns_inner(&self, mut uris: Vec<&str>, options: &XmlnsOptions) -> NamespaceResult<String> {
        if options.sort {
            uris.sort_unstable();
        }

        let mut have_default = false;
        let mut entries = Vec::with_capacity(uris.len());

        for uri in uris {
            let info = self.lookup_uri(uri)?;

            if options.preferred_only {
                if let Some(prefix) = &info.preferred_prefix {
                    entries.push(format!("xmlns:{prefix}=\"{}\"", info.uri));
                }
            } else {
                entries.extend(
                    info.prefixes
                        .iter()
                        .map(|prefix| format!("xmlns:{prefix}=\"{}\"", info.uri)),
                );
            }

            if info.preferred_prefix.is_some() {
                continue;
            }

            if !have_default {
                entries.push(format!("xmlns=\"{}\"", info.uri));
                have_default = true;
                continue;
            }

            // Default already taken: fall back on a registered prefix.
            let Some(fallback) = info.prefixes.first() else {
                return Err(NamespaceError::TooManyDefaultNamespaces {
                    uri: info.uri.clone(),
                });
            };
            if options.preferred_only {
                entries.push(format!("xmlns:{fallback}=\"{}\"", info.uri));
            }
        }

        Ok(entries.join(&options.delim))
    }

    /// Render an `xsi:schemaLocation` attribute for every namespace
    ///
    /// Namespaces without a schema location are skipped; if none has one the
    /// result is empty.
    #[must_use]
    pub fn render_schema_location(&self, sort: bool, delim: &str) -> String {
        let uris: Vec<&str> = self.namespace_uris().collect();
        // Every uri comes from this set, so lookups cannot fail.
        self.render_schema_location_inner(uris, sort, delim)
            .unwrap_or_default()
    }

    /// Render an `xsi:schemaLocation` attribute for the given namespaces
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if a uri isn't in this set
    pub fn render_schema_location_for<S: AsRef<str>>(
        &self,
        uris: &[S],
        sort: bool,
        delim: &str,
    ) -> NamespaceResult<String> {
        let uris: Vec<&str> = uris.iter().map(AsRef::as_ref).collect();
        self.render_schema_location_inner(uris, sort, delim)
    }

    fn render_schema_location_inner(
        &self,
        mut uris: Vec<&str>,
        sort: bool,
        delim: &str,
    ) -> NamespaceResult<String> {
        if sort {
            uris.sort_unstable();
        }

        let mut pairs = Vec::new();
        for uri in uris {
            let info = self.lookup_uri(uri)?;
            if let Some(loc) = &info.schema_location {
                pairs.push(format!("{} {loc}", info.uri));
            }
        }

        if pairs.is_empty() {
            return Ok(String::new());
        }

        Ok(format!("xsi:schemaLocation=\"{}\"", pairs.join(delim)))
    }

    /// Map every namespace uri to one prefix
    ///
    /// Uses the preferred prefix, else the first registered prefix.
    ///
    /// # Errors
    /// [`NamespaceError::NoPrefixes`] if some namespace has no prefix at all
    pub fn uri_to_prefix_map(&self) -> NamespaceResult<IndexMap<String, String>> {
        self.uri_map
            .values()
            .map(|info| {
                info.any_prefix()
                    .map(|p| (info.uri.clone(), p.to_string()))
                    .ok_or_else(|| NamespaceError::NoPrefixes {
                        uri: info.uri.clone(),
                    })
            })
            .collect()
    }

    /// Map one prefix per namespace to its uri
    ///
    /// # Errors
    /// [`NamespaceError::NoPrefixes`] if some namespace has no prefix at all
    pub fn prefix_to_uri_map(&self) -> NamespaceResult<IndexMap<String, String>> {
        Ok(self
            .uri_to_prefix_map()?
            .into_iter()
            .map(|(uri, prefix)| (prefix, uri))
            .collect())
    }

    /// Map namespace uri to schema location, skipping namespaces without one
    #[must_use]
    pub fn uri_schemaloc_map(&self) -> IndexMap<String, String> {
        self.uri_map
            .values()
            .filter_map(|info| {
                info.schema_location
                    .as_ref()
                    .map(|loc| (info.uri.clone(), loc.clone()))
            })
            .collect()
    }

    /// Namespace uris in registration order
    pub fn namespace_uris(&self) -> impl Iterator<Item = &str> {
        self.uri_map.keys().map(String::as_str)
    }

    /// Number of namespaces
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.uri_map.len()
    }

    /// Whether this set holds no namespaces
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uri_map.is_empty()
    }

    /// Deep copy of the data for the given namespaces
    ///
    /// # Errors
    /// [`NamespaceError::NamespaceNotFound`] if a uri isn't in this set
    pub fn subset<S: AsRef<str>>(&self, uris: &[S]) -> NamespaceResult<NamespaceSet> {
        let mut sub = NamespaceSet::new();
        for uri in uris {
            let info = self.lookup_uri(uri.as_ref())?;
            sub.insert_info(info.clone());
        }
        Ok(sub)
    }

    /// Import namespaces from `other`
    ///
    /// With `replace` unset, namespaces already present here are skipped.
    /// With `replace` set, their data is wholesale replaced by a copy of
    /// `other`'s. Prefix conflicts are checked against this set.
    ///
    /// # Errors
    /// [`NamespaceError::DuplicatePrefix`] if `other` maps a prefix
    /// incompatibly; this set is then unchanged.
    pub fn import_from(&mut self, other: &NamespaceSet, replace: bool) -> NamespaceResult<()> {
        let mut staged = self.clone();

        for (uri, other_info) in &other.uri_map {
            let present = staged.contains_namespace(uri);
            if present && !replace {
                continue;
            }

            for prefix in &other_info.prefixes {
                staged.check_prefix_conflict(uri, prefix)?;
            }

            if present {
                staged.remove_namespace(uri);
            }
            staged.insert_info(other_info.clone());
        }

        *self = staged;
        Ok(())
    }

    /// Check the structural invariants
    ///
    /// # Errors
    /// [`NamespaceError::InvalidNamespaceSet`] describing the first violation
    pub fn assert_valid(&self) -> NamespaceResult<()> {
        for (uri, info) in &self.uri_map {
            if info.uri.is_empty() {
                return Err(NamespaceError::InvalidNamespaceSet(format!(
                    "uri not set in namespace info:\n{info}"
                )));
            }

            if *uri != info.uri {
                return Err(NamespaceError::InvalidNamespaceSet(format!(
                    "uri mismatch in map ({uri}) and namespace info ({})",
                    info.uri
                )));
            }

            if let Some(preferred) = &info.preferred_prefix {
                if !info.prefixes.contains(preferred) {
                    return Err(NamespaceError::InvalidNamespaceSet(format!(
                        "namespace {uri}: preferred prefix \"{preferred}\" not in prefixes"
                    )));
                }
            }

            for prefix in &info.prefixes {
                if prefix.is_empty() {
                    return Err(NamespaceError::InvalidNamespaceSet(format!(
                        "namespace {uri}: empty value in prefix set"
                    )));
                }
                match self.prefix_map.get(prefix) {
                    None => {
                        return Err(NamespaceError::InvalidNamespaceSet(format!(
                            "namespace {uri}: prefix \"{prefix}\" not in prefix map"
                        )));
                    }
                    Some(owner) if owner != uri => {
                        return Err(NamespaceError::InvalidNamespaceSet(format!(
                            "namespace {uri}: prefix \"{prefix}\" maps to wrong namespace {owner}"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        for (prefix, owner) in &self.prefix_map {
            if prefix.is_empty() {
                return Err(NamespaceError::InvalidNamespaceSet(
                    "empty prefix is in prefix map".to_string(),
                ));
            }
            let owned = self
                .uri_map
                .get(owner)
                .is_some_and(|info| info.prefixes.contains(prefix));
            if !owned {
                return Err(NamespaceError::InvalidNamespaceSet(format!(
                    "prefix \"{prefix}\" points at {owner}, which does not own it"
                )));
            }
        }

        Ok(())
    }

    /// Whether the structural invariants hold
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.assert_valid().is_ok()
    }
}

impl PartialEq for NamespaceSet {
    /// Same namespaces, and for each the same prefixes, preferred prefix and
    /// schema location
    fn eq(&self, other: &Self) -> bool {
        self.uri_map == other.uri_map
    }
}

impl Eq for NamespaceSet {}

impl Display for NamespaceSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for info in self.uri_map.values() {
            if !first {
                write!(f, "\n\n")?;
            }
            write!(f, "{info}")?;
            first = false;
        }
        Ok(())
    }
}
