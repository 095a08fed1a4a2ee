//! Polymorphic reconstruction
//!
//! A field whose values may be any of several subclasses names an
//! [`EntityFactory`] instead of a single class. The factory reads a type key
//! from the input (the `xsi:type` dict key or the binding object's
//! `xsi:type`) and picks the class to reconstruct.

use crate::class::{ClassRegistry, EntityClass};
use crate::entity::Entity;
use crate::error::{EntityError, Result};
use crate::value::BindingValue;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::trace;

/// Dict key holding the type key
pub const XSI_TYPE_KEY: &str = "xsi:type";

/// Maps type keys to entity classes
pub trait EntityFactory: Send + Sync {
    /// Class for a type key; `None` when the input carried no key
    ///
    /// # Errors
    /// [`EntityError::UnknownTypeKey`] if the key maps to no class
    fn entity_class(&self, key: Option<&str>) -> Result<Arc<EntityClass>>;

    /// Dict key read for the type key
    fn dict_key(&self) -> &str {
        XSI_TYPE_KEY
    }

    /// Reconstruct from a dict, using `fallback` as the type key of non-dict input
    ///
    /// `null` and empty input yield `None`. Any other non-dict input, bare
    /// strings included, is never passed through unchanged: it is handed to
    /// the constructor of the class `fallback` resolves to, and fails with
    /// [`EntityError::Construction`] when that class has none.
    ///
    /// # Errors
    /// Class lookup failures, or as [`Entity::from_dict`]
    fn from_dict_with_fallback(&self, json: &JsonValue, fallback: Option<&str>) -> Result<Option<Entity>> {
        let key = match json {
            JsonValue::Null => return Ok(None),
            JsonValue::Object(map) if map.is_empty() => return Ok(None),
            JsonValue::Array(items) if items.is_empty() => return Ok(None),
            JsonValue::String(s) if s.is_empty() => return Ok(None),
            JsonValue::Object(map) => map.get(self.dict_key()).and_then(JsonValue::as_str),
            _ => fallback,
        };

        let class = self.entity_class(key)?;
        trace!(key, class = class.name(), "factory resolved dict");
        Entity::from_dict(&class, json)
    }

    /// Reconstruct from a dict
    ///
    /// # Errors
    /// As [`EntityFactory::from_dict_with_fallback`]
    fn from_dict(&self, json: &JsonValue) -> Result<Option<Entity>> {
        self.from_dict_with_fallback(json, None)
    }

    /// Reconstruct from a binding value, keyed by the object's `xsi:type`
    ///
    /// # Errors
    /// Class lookup failures, or as [`Entity::from_obj`]
    fn from_obj(&self, binding: &BindingValue) -> Result<Option<Entity>> {
        let key = match binding {
            BindingValue::Null => return Ok(None),
            BindingValue::Object(obj) => obj.xsi_type(),
            _ => None,
        };

        let class = self.entity_class(key)?;
        trace!(key, class = class.name(), "factory resolved binding object");
        Entity::from_obj(&class, binding)
    }
}

/// Factory backed by a class registry, keyed by each class's `xsi:type`
///
/// # Example
/// ```
/// use ctibind_entity::{ClassRegistry, EntityClass, EntityFactory, RegistryFactory, TypedField};
/// use serde_json::json;
///
/// let file = EntityClass::builder("File")
///     .xsi_type("FileObj:FileObjectType")
///     .field(TypedField::new("Size"))
///     .build()
///     .unwrap();
///
/// let mut registry = ClassRegistry::new();
/// registry.register(&file);
/// let factory = RegistryFactory::new(registry);
///
/// let entity = factory
///     .from_dict(&json!({"xsi:type": "FileObj:FileObjectType", "size": 10}))
///     .unwrap()
///     .unwrap();
/// assert_eq!(entity.class().name(), "File");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegistryFactory {
    registry: ClassRegistry,
    default_class: Option<Arc<EntityClass>>,
}

impl RegistryFactory {
    /// Factory over `registry`
    #[must_use]
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            registry,
            default_class: None,
        }
    }

    /// Class used when the input carries no type key
    #[must_use]
    pub fn with_default(mut self, class: &Arc<EntityClass>) -> Self {
        self.default_class = Some(Arc::clone(class));
        self
    }

    /// Underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }
}

impl EntityFactory for RegistryFactory {
    fn entity_class(&self, key: Option<&str>) -> Result<Arc<EntityClass>> {
        let found = match key {
            Some(key) => self.registry.by_xsi_type(key),
            None => self.default_class.as_ref(),
        };
        found.cloned().ok_or_else(|| EntityError::UnknownTypeKey {
            key: key.map(str::to_string),
        })
    }
}

/// Object that reconstructs the nested values of a field
#[derive(Clone, Copy)]
pub enum Transformer<'a> {
    /// Polymorphic: the factory picks the class
    Factory(&'a dyn EntityFactory),
    /// The field's declared class
    Class(&'a Arc<EntityClass>),
}

impl Transformer<'_> {
    /// Reconstruct from a dict
    ///
    /// `fallback` is the type key a factory uses for non-dict input.
    ///
    /// # Errors
    /// As [`EntityFactory::from_dict_with_fallback`] or [`Entity::from_dict`]
    pub fn from_dict(&self, json: &JsonValue, fallback: Option<&str>) -> Result<Option<Entity>> {
        match self {
            Self::Factory(factory) => factory.from_dict_with_fallback(json, fallback),
            Self::Class(class) => Entity::from_dict(class, json),
        }
    }

    /// Reconstruct from a binding value
    ///
    /// # Errors
    /// As [`EntityFactory::from_obj`] or [`Entity::from_obj`]
    pub fn from_obj(&self, binding: &BindingValue) -> Result<Option<Entity>> {
        match self {
            Self::Factory(factory) => factory.from_obj(binding),
            Self::Class(class) => Entity::from_obj(class, binding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TypedField;
    use crate::value::BindingObject;
    use serde_json::json;

    fn factory() -> RegistryFactory {
        let base = EntityClass::builder("Props")
            .field(TypedField::new("Custom"))
            .build()
            .unwrap();
        let address = EntityClass::builder("Address")
            .parent(&base)
            .xsi_type("AddressObj:AddressObjectType")
            .field(TypedField::new("Value"))
            .build()
            .unwrap();
        let uri = EntityClass::builder("Uri")
            .parent(&base)
            .xsi_type("URIObj:URIObjectType")
            .field(TypedField::new("Value"))
            .build()
            .unwrap();

        let mut registry = ClassRegistry::new();
        registry.register(&address);
        registry.register(&uri);
        RegistryFactory::new(registry).with_default(&base)
    }

    #[test]
    fn dict_type_key_selects_class() {
        let factory = factory();
        let entity = factory
            .from_dict(&json!({"xsi:type": "URIObj:URIObjectType", "value": "http://x"}))
            .unwrap()
            .unwrap();
        assert_eq!(entity.class().name(), "Uri");

        let untyped = factory.from_dict(&json!({"custom": 1})).unwrap().unwrap();
        assert_eq!(untyped.class().name(), "Props");
    }

    #[test]
    fn empty_input_yields_none() {
        let factory = factory();
        assert!(factory.from_dict(&JsonValue::Null).unwrap().is_none());
        assert!(factory.from_dict(&json!({})).unwrap().is_none());
        assert!(factory.from_obj(&BindingValue::Null).unwrap().is_none());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let factory = factory();
        let err = factory
            .from_dict(&json!({"xsi:type": "Nope:NopeType"}))
            .unwrap_err();
        assert!(matches!(err, EntityError::UnknownTypeKey { key: Some(k) } if k == "Nope:NopeType"));

        let bare = RegistryFactory::default();
        assert!(matches!(
            bare.from_dict(&json!({"a": 1})),
            Err(EntityError::UnknownTypeKey { key: None })
        ));
    }

    #[test]
    fn binding_xsi_type_selects_class() {
        let factory = factory();
        let obj = BindingObject::new("AddressObjectType")
            .with_xsi_type("AddressObj:AddressObjectType")
            .with("Value", "10.0.0.1");

        let entity = factory.from_obj(&BindingValue::Object(obj)).unwrap().unwrap();
        assert_eq!(entity.class().name(), "Address");
        assert_eq!(entity.get("value").and_then(|v| v.as_str()), Some("10.0.0.1"));
    }

    #[test]
    fn scalar_uses_fallback_key() {
        let factory = factory();
        let err = factory
            .from_dict_with_fallback(&json!("10.0.0.1"), Some("AddressObj:AddressObjectType"))
            .unwrap_err();
        assert!(matches!(err, EntityError::Construction { class, .. } if class == "Address"));
    }

    #[test]
    fn bare_string_is_constructed_not_returned() {
        let hash = EntityClass::builder("Hash")
            .xsi_type("cyboxCommon:HashType")
            .field(TypedField::new("Simple_Hash_Value"))
            .constructor(|class, value| Entity::new(class).with("simple_hash_value", value))
            .build()
            .unwrap();
        let mut registry = ClassRegistry::new();
        registry.register(&hash);
        let factory = RegistryFactory::new(registry);

        let entity = factory
            .from_dict_with_fallback(&json!("d41d8cd9"), Some("cyboxCommon:HashType"))
            .unwrap()
            .unwrap();
        assert_eq!(entity.class().name(), "Hash");
        assert_eq!(
            entity.get("simple_hash_value").and_then(|v| v.as_str()),
            Some("d41d8cd9")
        );
    }
}
