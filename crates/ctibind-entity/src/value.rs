//! Value model
//!
//! Three representations of entity data:
//! - [`Value`]: in-memory field values of an entity graph
//! - `serde_json::Value`: the dict representation
//! - [`BindingValue`] / [`BindingObject`]: the binding tree handed to an XML
//!   binding layer
//!
//! Absence is always `Option::None` on the in-memory side; there is no null
//! [`Value`].

use crate::entity::Entity;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// In-memory field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
    /// Nested entity
    Entity(Box<Entity>),
    /// Ordered sequence (values of `multiple` fields)
    List(Vec<Value>),
    /// Opaque mapping held by untyped fields
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Short type name used in error messages; entity values report their class
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Entity(entity) => entity.class().name(),
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// String contents, if this is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if this is an integer
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float contents, if this is a float
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Nested entity, if this is one
    #[inline]
    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Mutable nested entity, if this is one
    #[inline]
    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Sequence items, if this is a list
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is a list
    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Items of this list, turning any other value into an empty list first
    pub(crate) fn list_mut_or_init(&mut self) -> &mut Vec<Value> {
        if !self.is_list() {
            *self = Self::List(Vec::new());
        }
        match self {
            Self::List(items) => items,
            _ => unreachable!("value was just normalized to a list"),
        }
    }

    /// Dict representation of this value
    ///
    /// Nested entities render through [`Entity::to_dict`]; non-finite floats
    /// have no JSON form and render as `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::Entity(entity) => entity.to_dict(),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Untyped value from its dict representation; `null` is absence
    ///
    /// Nulls inside arrays and objects are dropped.
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            JsonValue::String(s) => Some(Self::Str(s.clone())),
            JsonValue::Array(items) => Some(Self::List(items.iter().filter_map(Self::from_json).collect())),
            JsonValue::Object(map) => Some(Self::Map(
                map.iter()
                    .filter_map(|(key, value)| Self::from_json(value).map(|v| (key.clone(), v)))
                    .collect(),
            )),
        }
    }

    /// Binding representation of this value without namespace collection
    #[must_use]
    pub fn to_binding(&self) -> BindingValue {
        match self {
            Self::Bool(b) => BindingValue::Bool(*b),
            Self::Int(i) => BindingValue::Int(*i),
            Self::Float(f) => BindingValue::Float(*f),
            Self::Str(s) => BindingValue::Str(s.clone()),
            Self::Entity(entity) => BindingValue::Object(entity.to_obj()),
            Self::List(items) => BindingValue::List(items.iter().map(Self::to_binding).collect()),
            Self::Map(map) => BindingValue::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_binding()))
                    .collect(),
            ),
        }
    }

    /// Untyped value from a binding value; `Null` is absence
    ///
    /// Binding objects reached without a declared type keep only their
    /// attributes, as a map.
    #[must_use]
    pub fn from_binding(binding: &BindingValue) -> Option<Self> {
        match binding {
            BindingValue::Null => None,
            BindingValue::Bool(b) => Some(Self::Bool(*b)),
            BindingValue::Int(i) => Some(Self::Int(*i)),
            BindingValue::Float(f) => Some(Self::Float(*f)),
            BindingValue::Str(s) => Some(Self::Str(s.clone())),
            BindingValue::List(items) => {
                Some(Self::List(items.iter().filter_map(Self::from_binding).collect()))
            }
            BindingValue::Object(obj) => Some(Self::Map(attrs_to_values(&obj.attrs))),
            BindingValue::Map(map) => Some(Self::Map(attrs_to_values(map))),
        }
    }
}

fn attrs_to_values(attrs: &IndexMap<String, BindingValue>) -> IndexMap<String, Value> {
    attrs
        .iter()
        .filter_map(|(key, value)| Value::from_binding(value).map(|v| (key.clone(), v)))
        .collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Self::Entity(Box::new(entity))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

/// A value in the binding tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BindingValue {
    /// Attribute present but unset
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
    /// Nested binding object
    Object(BindingObject),
    /// Sequence
    List(Vec<BindingValue>),
    /// Opaque mapping
    Map(IndexMap<String, BindingValue>),
}

impl BindingValue {
    /// Whether this is `Null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Nested object, if this is one
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&BindingObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// String contents, if this is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence items, if this is a list
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[BindingValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for BindingValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for BindingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<BindingObject> for BindingValue {
    fn from(obj: BindingObject) -> Self {
        Self::Object(obj)
    }
}

impl From<Vec<BindingValue>> for BindingValue {
    fn from(items: Vec<BindingValue>) -> Self {
        Self::List(items)
    }
}

/// A node of the binding tree
///
/// Carries its binding class name, an optional `xsi:type` and one attribute
/// per field, keyed by the field's binding name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingObject {
    class_name: String,
    xsi_type: Option<String>,
    attrs: IndexMap<String, BindingValue>,
}

impl BindingObject {
    /// Create an empty object of the given binding class
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            xsi_type: None,
            attrs: IndexMap::new(),
        }
    }

    /// With an attribute set
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<BindingValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// With an `xsi:type`
    #[must_use]
    pub fn with_xsi_type(mut self, xsi_type: impl Into<String>) -> Self {
        self.xsi_type = Some(xsi_type.into());
        self
    }

    /// Binding class name
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `xsi:type` value, if any
    #[inline]
    #[must_use]
    pub fn xsi_type(&self) -> Option<&str> {
        self.xsi_type.as_deref()
    }

    /// Set or clear the `xsi:type`
    pub fn set_xsi_type(&mut self, xsi_type: Option<String>) {
        self.xsi_type = xsi_type;
    }

    /// Attribute value; `None` if the attribute is missing entirely
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BindingValue> {
        self.attrs.get(name)
    }

    /// Set an attribute
    pub fn set(&mut self, name: impl Into<String>, value: BindingValue) {
        self.attrs.insert(name.into(), value);
    }

    /// Remove an attribute
    pub fn remove(&mut self, name: &str) -> Option<BindingValue> {
        self.attrs.shift_remove(name)
    }

    /// Whether the attribute exists (possibly `Null`)
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attributes in insertion order
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &BindingValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_null_is_absence() {
        assert_eq!(Value::from_json(&JsonValue::Null), None);
        assert_eq!(
            Value::from_json(&json!([1, null, "a"])),
            Some(Value::List(vec![Value::Int(1), Value::from("a")]))
        );
    }

    #[test]
    fn json_numbers_keep_integers() {
        assert_eq!(Value::from_json(&json!(3)), Some(Value::Int(3)));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
    }

    #[test]
    fn untyped_map_survives_json() {
        let json = json!({"b": 1, "a": {"c": true}});
        let value = Value::from_json(&json).unwrap();
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn binding_object_attributes() {
        let obj = BindingObject::new("FooType")
            .with("Name", "x")
            .with("Empty", BindingValue::Null)
            .with_xsi_type("foo:FooType");

        assert_eq!(obj.class_name(), "FooType");
        assert_eq!(obj.xsi_type(), Some("foo:FooType"));
        assert_eq!(obj.get("Name").and_then(BindingValue::as_str), Some("x"));
        assert!(obj.contains("Empty"));
        assert!(obj.get("Missing").is_none());
    }

    #[test]
    fn binding_object_reads_back_as_map() {
        let obj = BindingObject::new("T").with("A", 1_i64).with("B", BindingValue::Null);
        let value = Value::from_binding(&BindingValue::Object(obj)).unwrap();
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("A"), Some(&Value::Int(1)));
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::from("x").type_name(), "str");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(BindingValue::Null.type_name(), "null");
    }
}
