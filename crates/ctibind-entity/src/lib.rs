//! ctibind Entities
//!
//! Typed entity classes whose instances convert between three forms:
//! an in-memory entity graph, a dict (JSON) document and the binding tree
//! handed to an XML binding layer.
//!
//! # Core Concepts
//!
//! - [`TypedField`]: Declared type, multiplicity, naming and hooks of one attribute
//! - [`EntityClass`]: Fields (inherited and own), namespace binding, constructor
//! - [`Entity`]: Instance storing values keyed by field identity
//! - [`EntityList`]: Sequence view of a list-class entity
//! - [`EntityFactory`]: Picks a subclass from an `xsi:type` key
//! - [`NamespaceCollector`]: Harvests namespaces while building a binding tree
//!
//! # Example
//!
//! ```rust
//! use ctibind_entity::{Entity, EntityClass, ScalarKind, TypedField};
//! use serde_json::json;
//!
//! let indicator = EntityClass::builder("Indicator")
//!     .field(TypedField::new("Title").with_type(ScalarKind::String))
//!     .field(TypedField::new("Confidence").with_type(ScalarKind::Integer))
//!     .field(TypedField::new("Alternative_ID").multiple())
//!     .build()?;
//!
//! let mut entity = Entity::new(&indicator);
//! entity.set("title", "Bad IP")?;
//! entity.set("confidence", "80")?;
//! entity.set("alternative_id", "ip-watchlist")?;
//!
//! let dict = entity.to_dict();
//! assert_eq!(
//!     dict,
//!     json!({"title": "Bad IP", "confidence": 80, "alternative_id": ["ip-watchlist"]})
//! );
//! assert_eq!(Entity::from_dict(&indicator, &dict)?, Some(entity));
//! # Ok::<(), ctibind_entity::EntityError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod class;
mod collector;
mod entity;
mod error;
mod factory;
pub mod field;
pub mod idgen;
mod list;
mod parser;
mod value;
mod xml;

pub use class::{
    lookup_class, register_class, ClassKind, ClassRegistry, Constructor, EntityClass,
    EntityClassBuilder, FinalizeDict, FinalizeObj,
};
pub use collector::{CollectorContext, NamespaceCollector};
pub use entity::Entity;
pub use error::{EntityError, Result};
pub use factory::{EntityFactory, RegistryFactory, Transformer, XSI_TYPE_KEY};
pub use field::{
    mutually_exclusive, BindingHook, ClassRef, DictHook, FieldCriteria, FieldHook, FieldType,
    ScalarKind, TypedField,
};
pub use idgen::{create_id, IdGenerator, IdMethod, EXAMPLE_NAMESPACE};
pub use list::EntityList;
pub use parser::{
    parse_schemaloc_pairs, EntityParser, ParseOptions, XmlDocument, SCHEMA_LOCATION_ATTR,
};
pub use value::{BindingObject, BindingValue, Value};
pub use xml::{SerializeOptions, XmlWriter};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring and converting entities
    pub use crate::{
        BindingObject, BindingValue, Entity, EntityClass, EntityError, EntityFactory, EntityList,
        FieldType, NamespaceCollector, ScalarKind, SerializeOptions, TypedField, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
