//! ctibind Namespaces
//!
//! XML namespace bookkeeping for typed entity bindings.
//!
//! # Core Concepts
//!
//! - [`Namespace`]: An immutable (uri, prefix, schema location) triple
//! - [`NamespaceSet`]: Registry of namespaces with prefix conflict detection,
//!   preferred prefixes and deterministic `xmlns` rendering
//! - [`registry`]: The process-wide set of known namespaces
//!
//! # Example
//!
//! ```rust
//! use ctibind_namespace::{NamespaceSet, XmlnsOptions};
//!
//! let mut set = NamespaceSet::new();
//! set.add_namespace_uri("urn:a", Some("a"), Some("a.xsd"))?;
//! set.add_namespace_uri("urn:b", None, None)?;
//!
//! let xmlns = set.render_xmlns(&XmlnsOptions::new().with_delim(" "))?;
//! assert_eq!(xmlns, r#"xmlns:a="urn:a" xmlns="urn:b""#);
//! # Ok::<(), ctibind_namespace::NamespaceError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod namespace;
pub mod registry;
mod set;

pub use error::{NamespaceError, NamespaceResult};
pub use namespace::Namespace;
pub use registry::{
    get_full_ns_map, get_full_prefix_map, get_full_schemaloc_map, get_schemaloc_string,
    get_xmlns_string, lookup_name, lookup_prefix, make_namespace_subset_from_uris,
    register_namespace, xml_namespaces, NS_XLINK, NS_XML_DSIG, NS_XML_SCHEMA,
    NS_XML_SCHEMA_INSTANCE,
};
pub use set::{NamespaceSet, XmlnsOptions};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with namespaces
    pub use crate::{Namespace, NamespaceError, NamespaceResult, NamespaceSet, XmlnsOptions};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
