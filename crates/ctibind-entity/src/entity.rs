//! Entity instances
//!
//! An [`Entity`] is an instance of an [`EntityClass`]: a store of field
//! values keyed by field identity, plus the namespaces and schema locations
//! seen when it was parsed from a document.
//!
//! Conversions:
//! - [`Entity::to_obj`] / [`Entity::from_obj`]: binding tree
//! - [`Entity::to_dict`] / [`Entity::from_dict`]: dict (JSON) representation

use crate::class::EntityClass;
use crate::collector::NamespaceCollector;
use crate::error::{EntityError, Result};
use crate::field::TypedField;
use crate::list::EntityList;
use crate::value::{BindingObject, BindingValue, Value};
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Identity of a field specification
///
/// Derived from the address of the shared [`TypedField`]; the slot holding
/// the value also holds the `Arc`, so the address stays unique while stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FieldId(usize);

impl FieldId {
    fn of(field: &TypedField) -> Self {
        Self(field as *const TypedField as usize)
    }
}

#[derive(Clone)]
struct Slot {
    field: Arc<TypedField>,
    value: Option<Value>,
}

/// Instance of an entity class
#[derive(Clone)]
pub struct Entity {
    class: Arc<EntityClass>,
    fields: IndexMap<FieldId, Slot>,
    input_namespaces: IndexMap<String, String>,
    input_schemalocations: IndexMap<String, String>,
}

impl Entity {
    /// Create an instance with no field set
    #[must_use]
    pub fn new(class: &Arc<EntityClass>) -> Self {
        Self {
            class: Arc::clone(class),
            fields: IndexMap::new(),
            input_namespaces: IndexMap::new(),
            input_schemalocations: IndexMap::new(),
        }
    }

    /// Class of this instance
    #[inline]
    #[must_use]
    pub fn class(&self) -> &Arc<EntityClass> {
        &self.class
    }

    /// Field with the given attribute name
    ///
    /// # Errors
    /// [`EntityError::UnknownField`] if the class declares no such field
    pub fn field(&self, attr: &str) -> Result<&Arc<TypedField>> {
        self.class.field(attr).ok_or_else(|| EntityError::UnknownField {
            class: self.class.name().to_string(),
            attr: attr.to_string(),
        })
    }

    /// Stored slot for `field`: outer `None` when the field was never set
    pub(crate) fn stored(&self, field: &TypedField) -> Option<Option<&Value>> {
        self.fields
            .get(&FieldId::of(field))
            .map(|slot| slot.value.as_ref())
    }

    /// Clean, run hooks and store a value for `field`
    ///
    /// Order: normalize (multiplicity and type), pre-set hook, store,
    /// post-set hook. A failing step leaves the previous value in place,
    /// except for a failing post-set hook, which runs after the store.
    ///
    /// # Errors
    /// - [`EntityError::TypeMismatch`] / [`EntityError::Construction`] from cleaning
    /// - Any error returned by a hook
    pub fn set_field(&mut self, field: &Arc<TypedField>, value: Option<Value>) -> Result<()> {
        let value = field.normalize(value)?;

        if let Some(hook) = field.preset_hook() {
            hook(self, value.as_ref())?;
        }

        let committed = field.postset_hook().map(|_| value.clone());
        self.fields.insert(
            FieldId::of(field),
            Slot {
                field: Arc::clone(field),
                value,
            },
        );

        if let (Some(hook), Some(committed)) = (field.postset_hook(), committed) {
            hook(self, committed.as_ref())?;
        }
        Ok(())
    }

    /// Mutable access to the value of `field`
    ///
    /// A `multiple` field is initialized to an empty list on first access.
    pub fn get_field_mut(&mut self, field: &Arc<TypedField>) -> Option<&mut Value> {
        if field.is_multiple() {
            return Some(self.list_slot(field));
        }
        self.fields
            .get_mut(&FieldId::of(field))
            .and_then(|slot| slot.value.as_mut())
    }

    /// Items of a `multiple` field, initialized on first access
    pub(crate) fn list_mut(&mut self, field: &Arc<TypedField>) -> &mut Vec<Value> {
        self.list_slot(field).list_mut_or_init()
    }

    fn list_slot(&mut self, field: &Arc<TypedField>) -> &mut Value {
        let slot = self.fields.entry(FieldId::of(field)).or_insert_with(|| Slot {
            field: Arc::clone(field),
            value: None,
        });
        slot.value.get_or_insert_with(|| Value::List(Vec::new()))
    }

    /// Set a field by attribute name
    ///
    /// # Errors
    /// [`EntityError::UnknownField`], or as [`Entity::set_field`]
    pub fn set(&mut self, attr: &str, value: impl Into<Value>) -> Result<()> {
        self.set_opt(attr, Some(value.into()))
    }

    /// Set or clear a field by attribute name
    ///
    /// # Errors
    /// [`EntityError::UnknownField`], or as [`Entity::set_field`]
    pub fn set_opt(&mut self, attr: &str, value: Option<Value>) -> Result<()> {
        let field = Arc::clone(self.field(attr)?);
        self.set_field(&field, value)
    }

    /// Clear a field by attribute name
    ///
    /// # Errors
    /// [`EntityError::UnknownField`], or as [`Entity::set_field`]
    pub fn clear(&mut self, attr: &str) -> Result<()> {
        self.set_opt(attr, None)
    }

    /// Builder form of [`Entity::set`]
    ///
    /// # Errors
    /// As [`Entity::set`]
    pub fn with(mut self, attr: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(attr, value)?;
        Ok(self)
    }

    /// Value of a field by attribute name
    ///
    /// Unknown attributes and unset fields read as `None`; unset `multiple`
    /// fields read as an empty list.
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.class.field(attr).and_then(|field| field.get(self))
    }

    /// Fields that have been assigned, in declaration order
    pub fn assigned(&self) -> impl Iterator<Item = (&Arc<TypedField>, Option<&Value>)> {
        self.class
            .typed_fields()
            .iter()
            .filter_map(|field| self.stored(field).map(|value| (field, value)))
    }

    /// Prefix → uri pairs declared by the document this entity was parsed from
    #[inline]
    #[must_use]
    pub fn input_namespaces(&self) -> &IndexMap<String, String> {
        &self.input_namespaces
    }

    /// Uri → location pairs declared by the document this entity was parsed from
    #[inline]
    #[must_use]
    pub fn input_schemalocations(&self) -> &IndexMap<String, String> {
        &self.input_schemalocations
    }

    /// Record a namespace declaration from the source document
    pub fn add_input_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.input_namespaces.insert(prefix.into(), uri.into());
    }

    /// Record a schema location from the source document
    pub fn add_input_schemalocation(&mut self, uri: impl Into<String>, location: impl Into<String>) {
        self.input_schemalocations.insert(uri.into(), location.into());
    }

    /// Number of items of a list entity; `None` for plain entities
    pub(crate) fn list_len(&self) -> Option<usize> {
        let field = self.class.list_field()?;
        Some(field.get(self).and_then(Value::as_list).map_or(0, <[Value]>::len))
    }

    // ── binding tree ───────────────────────────────────────────────

    /// Binding object for this entity and everything below it
    #[must_use]
    pub fn to_obj(&self) -> BindingObject {
        self.build_obj(None)
    }

    /// As [`Entity::to_obj`], registering every visited entity with `collector`
    #[must_use]
    pub fn to_obj_with(&self, collector: &mut NamespaceCollector) -> BindingObject {
        self.build_obj(Some(collector))
    }

    fn build_obj(&self, mut collector: Option<&mut NamespaceCollector>) -> BindingObject {
        if let Some(collector) = collector.as_deref_mut() {
            collector.collect(self);
        }

        let mut obj = BindingObject::new(self.class.binding_class());
        obj.set_xsi_type(self.class.xsi_type().map(str::to_string));

        for (field, value) in self.assigned() {
            let binding = match value {
                Some(value) => Self::objectify(field, value, collector.as_deref_mut()),
                None => BindingValue::Null,
            };
            obj.set(field.name(), binding);
        }

        self.class.finalize_obj(self, &mut obj);
        obj
    }

    fn objectify(
        field: &TypedField,
        value: &Value,
        mut collector: Option<&mut NamespaceCollector>,
    ) -> BindingValue {
        match value {
            Value::List(items) if field.is_multiple() => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Self::objectify_one(field, item, collector.as_deref_mut()));
                }
                BindingValue::List(out)
            }
            single => Self::objectify_one(field, single, collector),
        }
    }

    fn objectify_one(
        field: &TypedField,
        value: &Value,
        collector: Option<&mut NamespaceCollector>,
    ) -> BindingValue {
        match value {
            Value::Entity(entity) if entity.list_len() == Some(0) => BindingValue::Null,
            Value::Entity(entity) => BindingValue::Object(entity.build_obj(collector)),
            other => field.binding_value(other),
        }
    }

    /// Reconstruct an entity of `class` from a binding value
    ///
    /// `Null` yields `None`. A scalar is handed to the class constructor.
    /// Attributes missing from the object are left unset.
    ///
    /// # Errors
    /// - [`EntityError::Construction`] if a scalar cannot be constructed into `class`
    /// - Any cleaning or hook error raised while setting fields
    pub fn from_obj(class: &Arc<EntityClass>, binding: &BindingValue) -> Result<Option<Self>> {
        match binding {
            BindingValue::Null => Ok(None),
            BindingValue::Object(obj) => Self::from_binding_object(class, obj).map(Some),
            other => match Value::from_binding(other) {
                Some(value) => class.construct(value).map(Some),
                None => Ok(None),
            },
        }
    }

    fn from_binding_object(class: &Arc<EntityClass>, obj: &BindingObject) -> Result<Self> {
        trace!(class = class.name(), binding = obj.class_name(), "reconstructing entity from binding object");

        let mut entity = Self::new(class);
        for field in class.typed_fields() {
            let Some(raw) = obj.get(field.name()) else {
                continue;
            };

            let value = match field.transformer()? {
                Some(transformer) if field.is_multiple() => {
                    let items = match raw {
                        BindingValue::Null => &[][..],
                        BindingValue::List(items) => items.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        if let Some(nested) = transformer.from_obj(item)? {
                            out.push(Value::from(nested));
                        }
                    }
                    Some(Value::List(out))
                }
                Some(transformer) => transformer.from_obj(raw)?.map(Value::from),
                None => Value::from_binding(raw),
            };

            entity.set_field(field, value)?;
        }
        Ok(entity)
    }

    // ── dict representation ────────────────────────────────────────

    /// Dict representation of this entity
    ///
    /// Unset, `None` and empty-list values are omitted. A list class whose
    /// only field is the list field renders as a bare array.
    #[must_use]
    pub fn to_dict(&self) -> JsonValue {
        if self.class.dict_as_list() {
            return JsonValue::Array(self.list_to_json());
        }

        let mut dict = JsonMap::new();
        for (field, value) in self.assigned() {
            let Some(value) = value else {
                continue;
            };
            let json = Self::dictify(field, value);
            if json.is_null() || json.as_array().is_some_and(Vec::is_empty) {
                continue;
            }
            dict.insert(field.key_name().to_string(), json);
        }

        self.class.finalize_dict(self, &mut dict);
        JsonValue::Object(dict)
    }

    /// Dict form of each item of a list entity
    pub(crate) fn list_to_json(&self) -> Vec<JsonValue> {
        let Some(field) = self.class.list_field() else {
            return Vec::new();
        };
        field
            .get(self)
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .map(|item| Self::dictify_one(field, item))
            .collect()
    }

    fn dictify(field: &TypedField, value: &Value) -> JsonValue {
        match value {
            Value::List(items) if field.is_multiple() => {
                JsonValue::Array(items.iter().map(|item| Self::dictify_one(field, item)).collect())
            }
            single => Self::dictify_one(field, single),
        }
    }

    fn dictify_one(field: &TypedField, value: &Value) -> JsonValue {
        match value {
            Value::Entity(entity) => entity.to_dict(),
            other => field.dict_value(other),
        }
    }

    /// Reconstruct an entity of `class` from its dict representation
    ///
    /// - `null` yields `None`, as does an empty dict or array for a list class
    /// - An array for a list class is read as its items
    /// - Any other non-object is handed to the class constructor
    ///
    /// Keys missing from the dict leave their field unset.
    ///
    /// # Errors
    /// - [`EntityError::Construction`] if a non-object cannot be constructed into `class`
    /// - Any cleaning or hook error raised while setting fields
    pub fn from_dict(class: &Arc<EntityClass>, json: &JsonValue) -> Result<Option<Self>> {
        if class.is_list() && is_falsy(json) {
            return Ok(None);
        }

        match json {
            JsonValue::Null => Ok(None),
            JsonValue::Object(map) => Self::from_dict_map(class, map).map(Some),
            JsonValue::Array(items) if class.is_list() => {
                Ok(EntityList::from_list(class, items)?.map(EntityList::into_entity))
            }
            other => match Value::from_json(other) {
                Some(value) => class.construct(value).map(Some),
                None => Ok(None),
            },
        }
    }

    fn from_dict_map(class: &Arc<EntityClass>, map: &JsonMap<String, JsonValue>) -> Result<Self> {
        trace!(class = class.name(), keys = map.len(), "reconstructing entity from dict");

        let mut entity = Self::new(class);
        for field in class.typed_fields() {
            let Some(raw) = map.get(field.key_name()) else {
                continue;
            };

            let value = match field.transformer()? {
                Some(transformer) if field.is_multiple() => {
                    let items = match raw {
                        JsonValue::Null => &[][..],
                        JsonValue::Array(items) => items.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        if let Some(nested) = transformer.from_dict(item, None)? {
                            out.push(Value::from(nested));
                        }
                    }
                    Some(Value::List(out))
                }
                Some(transformer) => transformer.from_dict(raw, None)?.map(Value::from),
                None if field.is_multiple() && is_falsy(raw) => Some(Value::List(Vec::new())),
                None => Value::from_json(raw),
            };

            entity.set_field(field, value)?;
        }
        Ok(entity)
    }

    // ── shortcuts ──────────────────────────────────────────────────

    /// JSON text of [`Entity::to_dict`]
    ///
    /// # Errors
    /// [`EntityError::Json`] if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    /// Parse JSON text and reconstruct through [`Entity::from_dict`]
    ///
    /// # Errors
    /// [`EntityError::Json`] for malformed text, or as [`Entity::from_dict`]
    pub fn from_json(class: &Arc<EntityClass>, text: &str) -> Result<Option<Self>> {
        let json: JsonValue = serde_json::from_str(text)?;
        Self::from_dict(class, &json)
    }

    /// Binding object for a dict, going through the entity form
    ///
    /// # Errors
    /// As [`Entity::from_dict`]
    pub fn object_from_dict(class: &Arc<EntityClass>, json: &JsonValue) -> Result<Option<BindingObject>> {
        Ok(Self::from_dict(class, json)?.map(|entity| entity.to_obj()))
    }

    /// Dict for a binding value, going through the entity form
    ///
    /// # Errors
    /// As [`Entity::from_obj`]
    pub fn dict_from_object(class: &Arc<EntityClass>, binding: &BindingValue) -> Result<JsonValue> {
        Ok(Self::from_obj(class, binding)?.map_or(JsonValue::Null, |entity| entity.to_dict()))
    }
}

/// `null`, `false`, zero, and empty strings, arrays and objects
fn is_falsy(json: &JsonValue) -> bool {
    match json {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

impl PartialEq for Entity {
    /// Same instance, or same class with every comparable field equal
    ///
    /// A class without comparable fields only compares equal by identity.
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if !Arc::ptr_eq(&self.class, &other.class) {
            return false;
        }

        let mut comparable = self
            .class
            .typed_fields()
            .iter()
            .filter(|field| field.is_comparable())
            .peekable();
        if comparable.peek().is_none() {
            return false;
        }
        comparable.all(|field| field.get(self) == field.get(other))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.class.name());
        for (field, value) in self.assigned() {
            out.field(&field.attr_name(), &value);
        }
        out.finish()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("field", &self.field.name())
            .field("value", &self.value)
            .finish()
    }
}
