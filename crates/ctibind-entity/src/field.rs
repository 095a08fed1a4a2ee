//! Typed field specifications
//!
//! A [`TypedField`] describes one attribute of an entity class: its binding
//! name, dict key, declared type, multiplicity and hooks. Fields are shared
//! by every instance of the declaring class (and its subclasses) and are
//! never mutated per instance.
//!
//! Values are stored on the [`Entity`] keyed by the field's identity, not its
//! name, so redeclared fields and clashing key names coexist.

use crate::class::{lookup_class, EntityClass};
use crate::entity::Entity;
use crate::error::{EntityError, Result};
use crate::factory::{EntityFactory, Transformer};
use crate::value::{BindingValue, Value};
use once_cell::sync::OnceCell;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Hook run around value assignment
///
/// Receives the entity being modified and the cleaned value being committed.
pub type FieldHook = Arc<dyn Fn(&mut Entity, Option<&Value>) -> Result<()> + Send + Sync>;

/// Per-field conversion of a non-entity value into the binding tree
pub type BindingHook = Arc<dyn Fn(&Value) -> BindingValue + Send + Sync>;

/// Per-field conversion of a non-entity value into the dict representation
pub type DictHook = Arc<dyn Fn(&Value) -> JsonValue + Send + Sync>;

/// Key names that get a trailing underscore in their attribute name
const RESERVED_ATTR_NAMES: [&str; 7] = ["from", "class", "type", "with", "for", "id", "range"];

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Text
    String,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
}

impl ScalarKind {
    /// Type name used in error messages
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
        }
    }

    /// Whether `value` already is of this kind
    #[must_use]
    pub fn is_instance(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::Str(_))
                | (Self::Integer, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::Boolean, Value::Bool(_))
        )
    }

    /// Convert `value` into this kind, if it has a lossless reading
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    #[must_use]
    pub fn cast(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::String, Value::Int(i)) => Some(Value::Str(i.to_string())),
            (Self::String, Value::Float(f)) => Some(Value::Str(f.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::Str(b.to_string())),
            (Self::Integer, Value::Str(s)) => s.trim().parse().ok().map(Value::Int),
            (Self::Integer, Value::Float(f))
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 =>
            {
                Some(Value::Int(*f as i64))
            }
            (Self::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (Self::Float, Value::Str(s)) => s.trim().parse().ok().map(Value::Float),
            (Self::Boolean, Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Reference to an entity class, either held directly or resolved by name
///
/// Named references resolve through the process-wide class registry on first
/// use and cache the result.
pub struct ClassRef {
    name: String,
    resolved: OnceCell<Arc<EntityClass>>,
}

impl ClassRef {
    /// Reference a class by name, resolved lazily
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: OnceCell::new(),
        }
    }

    /// Reference an already-built class
    #[must_use]
    pub fn of(class: &Arc<EntityClass>) -> Self {
        Self {
            name: class.name().to_string(),
            resolved: OnceCell::with_value(Arc::clone(class)),
        }
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referenced class
    ///
    /// # Errors
    /// [`EntityError::UnresolvedClass`] if the name was never registered
    pub fn resolve(&self) -> Result<&Arc<EntityClass>> {
        self.resolved.get_or_try_init(|| {
            lookup_class(&self.name).ok_or_else(|| EntityError::UnresolvedClass(self.name.clone()))
        })
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("name", &self.name)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

/// Declared type of a field
#[derive(Debug)]
pub enum FieldType {
    /// Built-in scalar
    Scalar(ScalarKind),
    /// Entity class (or any subclass)
    Entity(ClassRef),
}

impl FieldType {
    /// Entity type referenced by class name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Entity(ClassRef::named(name))
    }

    /// Type name used in error messages
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(kind) => kind.name(),
            Self::Entity(class_ref) => class_ref.name(),
        }
    }

    /// Whether this is an entity type
    #[inline]
    #[must_use]
    pub fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }
}

impl From<ScalarKind> for FieldType {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl From<&Arc<EntityClass>> for FieldType {
    fn from(class: &Arc<EntityClass>) -> Self {
        Self::Entity(ClassRef::of(class))
    }
}

/// Specification of one entity attribute
///
/// # Example
/// ```
/// use ctibind_entity::{ScalarKind, TypedField};
///
/// let field = TypedField::new("Description").with_type(ScalarKind::String);
/// assert_eq!(field.key_name(), "description");
///
/// let id = TypedField::new("ID");
/// assert_eq!(id.attr_name(), "id_");
/// ```
pub struct TypedField {
    name: String,
    field_type: Option<FieldType>,
    key_name: String,
    attr_name: Option<String>,
    comparable: bool,
    multiple: bool,
    preset_hook: Option<FieldHook>,
    postset_hook: Option<FieldHook>,
    factory: Option<Arc<dyn EntityFactory>>,
    binding_hook: Option<BindingHook>,
    dict_hook: Option<DictHook>,
}

impl TypedField {
    /// Untyped, single-valued, comparable field
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key_name: name.to_lowercase(),
            name,
            field_type: None,
            attr_name: None,
            comparable: true,
            multiple: false,
            preset_hook: None,
            postset_hook: None,
            factory: None,
            binding_hook: None,
            dict_hook: None,
        }
    }

    /// With a declared type
    #[must_use]
    pub fn with_type(mut self, field_type: impl Into<FieldType>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    /// With a dict key other than the lower-cased name
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// With an explicit attribute name
    #[must_use]
    pub fn with_attr_name(mut self, attr_name: impl Into<String>) -> Self {
        self.attr_name = Some(attr_name.into());
        self
    }

    /// Holds an ordered sequence of values
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Ignored by entity equality
    #[must_use]
    pub fn incomparable(mut self) -> Self {
        self.comparable = false;
        self
    }

    /// With a hook run before the value is stored
    #[must_use]
    pub fn with_preset_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.preset_hook = Some(Arc::new(hook));
        self
    }

    /// With a hook run after the value is stored
    #[must_use]
    pub fn with_postset_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.postset_hook = Some(Arc::new(hook));
        self
    }

    /// With a shared post-set hook, e.g. one built by [`mutually_exclusive`]
    #[must_use]
    pub fn with_postset(mut self, hook: FieldHook) -> Self {
        self.postset_hook = Some(hook);
        self
    }

    /// With a factory that reconstructs values instead of the declared type
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn EntityFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// With a custom binding conversion for non-entity values
    #[must_use]
    pub fn with_binding_value<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> BindingValue + Send + Sync + 'static,
    {
        self.binding_hook = Some(Arc::new(hook));
        self
    }

    /// With a custom dict conversion for non-entity values
    #[must_use]
    pub fn with_dict_value<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> JsonValue + Send + Sync + 'static,
    {
        self.dict_hook = Some(Arc::new(hook));
        self
    }

    /// Binding-tree attribute name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dict key
    #[inline]
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Attribute name used for lookups on an entity
    ///
    /// Explicit if given, else the key name with a trailing underscore when
    /// it collides with a reserved word.
    #[must_use]
    pub fn attr_name(&self) -> Cow<'_, str> {
        if let Some(attr) = &self.attr_name {
            return Cow::Borrowed(attr);
        }
        if RESERVED_ATTR_NAMES.contains(&self.key_name.as_str()) {
            Cow::Owned(format!("{}_", self.key_name))
        } else {
            Cow::Borrowed(&self.key_name)
        }
    }

    /// Declared type, if any
    #[inline]
    #[must_use]
    pub fn field_type(&self) -> Option<&FieldType> {
        self.field_type.as_ref()
    }

    /// Whether the field takes part in entity equality
    #[inline]
    #[must_use]
    pub fn is_comparable(&self) -> bool {
        self.comparable
    }

    /// Whether the field holds a sequence
    #[inline]
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub(crate) fn preset_hook(&self) -> Option<&FieldHook> {
        self.preset_hook.as_ref()
    }

    pub(crate) fn postset_hook(&self) -> Option<&FieldHook> {
        self.postset_hook.as_ref()
    }

    /// Object that reconstructs nested values: the factory if present, else
    /// the declared entity class
    ///
    /// # Errors
    /// [`EntityError::UnresolvedClass`] if the declared class cannot be resolved
    pub fn transformer(&self) -> Result<Option<Transformer<'_>>> {
        if let Some(factory) = &self.factory {
            return Ok(Some(Transformer::Factory(factory.as_ref())));
        }
        match &self.field_type {
            Some(FieldType::Entity(class_ref)) => Ok(Some(Transformer::Class(class_ref.resolve()?))),
            _ => Ok(None),
        }
    }

    /// Current value on `entity`
    ///
    /// An unset `multiple` field reads as an empty list.
    #[must_use]
    pub fn get<'e>(&self, entity: &'e Entity) -> Option<&'e Value> {
        static EMPTY_LIST: Value = Value::List(Vec::new());

        match entity.stored(self) {
            Some(value) => value,
            None if self.multiple => Some(&EMPTY_LIST),
            None => None,
        }
    }

    /// Validate and coerce a candidate value
    ///
    /// - `None` passes through, as does anything on an untyped field
    /// - Values already of the declared type pass through
    /// - Otherwise a scalar is parsed, or a castable entity class is
    ///   constructed from the value
    ///
    /// # Errors
    /// - [`EntityError::TypeMismatch`] if the value has no reading as the declared type
    /// - [`EntityError::Construction`] if the class constructor rejects the value
    pub fn clean(&self, value: Option<Value>) -> Result<Option<Value>> {
        let Some(value) = value else {
            return Ok(None);
        };

        match &self.field_type {
            None => Ok(Some(value)),
            Some(FieldType::Scalar(kind)) => {
                if kind.is_instance(&value) {
                    return Ok(Some(value));
                }
                kind.cast(&value)
                    .map(Some)
                    .ok_or_else(|| self.mismatch(kind.name(), &value))
            }
            Some(FieldType::Entity(class_ref)) => {
                let class = class_ref.resolve()?;
                let is_instance = matches!(
                    &value,
                    Value::Entity(entity) if entity.class().is_subclass_of(class)
                );
                if is_instance {
                    return Ok(Some(value));
                }
                if class.is_castable() {
                    return class.construct(value).map(|entity| Some(Value::from(entity)));
                }
                Err(self.mismatch(class.name(), &value))
            }
        }
    }

    /// Apply multiplicity rules and clean the result
    ///
    /// For `multiple` fields `None` becomes an empty list, a single value a
    /// one-element list and each list item is cleaned.
    ///
    /// # Errors
    /// Fails as [`TypedField::clean`] does
    pub fn normalize(&self, value: Option<Value>) -> Result<Option<Value>> {
        if !self.multiple {
            return self.clean(value);
        }

        let items = match value {
            None => Vec::new(),
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| self.clean(Some(item)))
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>>>()?,
            Some(single) => self.clean(Some(single))?.into_iter().collect(),
        };

        Ok(Some(Value::List(items)))
    }

    /// Binding form of a non-entity value
    pub(crate) fn binding_value(&self, value: &Value) -> BindingValue {
        match &self.binding_hook {
            Some(hook) => hook(value),
            None => value.to_binding(),
        }
    }

    /// Dict form of a non-entity value
    pub(crate) fn dict_value(&self, value: &Value) -> JsonValue {
        match &self.dict_hook {
            Some(hook) => hook(value),
            None => value.to_json(),
        }
    }

    fn mismatch(&self, expected: &str, value: &Value) -> EntityError {
        EntityError::type_mismatch(&self.name, expected, value.type_name())
    }
}

impl fmt::Debug for TypedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedField")
            .field("name", &self.name)
            .field("key_name", &self.key_name)
            .field("type", &self.field_type.as_ref().map(FieldType::name))
            .field("multiple", &self.multiple)
            .field("comparable", &self.comparable)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attr_name())
    }
}

/// Filter for [`find`]; unset criteria match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCriteria {
    /// Binding name
    pub name: Option<String>,
    /// Dict key
    pub key_name: Option<String>,
    /// Multiplicity
    pub multiple: Option<bool>,
}

impl FieldCriteria {
    /// Match everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only fields with this binding name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only fields with this dict key
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Only fields of this multiplicity
    #[must_use]
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    fn matches(&self, field: &TypedField) -> bool {
        self.name.as_deref().map_or(true, |n| n == field.name())
            && self.key_name.as_deref().map_or(true, |k| k == field.key_name())
            && self.multiple.map_or(true, |m| m == field.is_multiple())
    }
}

/// Fields of `class` (inherited included) matching `criteria`
#[must_use]
pub fn find(class: &EntityClass, criteria: &FieldCriteria) -> Vec<Arc<TypedField>> {
    class
        .typed_fields()
        .iter()
        .filter(|field| criteria.matches(field.as_ref()))
        .cloned()
        .collect()
}

/// Clear every field of `entity` accepted by `predicate` (all when `None`)
///
/// # Errors
/// Propagates hook failures
pub fn unset(entity: &mut Entity, predicate: Option<&dyn Fn(&TypedField) -> bool>) -> Result<()> {
    let fields: Vec<Arc<TypedField>> = entity
        .class()
        .typed_fields()
        .iter()
        .filter(|field| predicate.map_or(true, |accept| accept(field.as_ref())))
        .cloned()
        .collect();

    for field in &fields {
        entity.set_field(field, None)?;
    }
    Ok(())
}

/// Post-set hook clearing the sibling field `other_attr` whenever this field
/// is set to a value
///
/// Used for id / idref pairs where at most one may be set.
#[must_use]
pub fn mutually_exclusive(other_attr: impl Into<String>) -> FieldHook {
    let other_attr = other_attr.into();
    Arc::new(move |entity: &mut Entity, value: Option<&Value>| {
        if value.is_some() {
            entity.clear(&other_attr)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_defaults_to_lowercase() {
        let field = TypedField::new("Short_Description");
        assert_eq!(field.key_name(), "short_description");
        assert_eq!(field.attr_name(), "short_description");

        let field = TypedField::new("Title").with_key_name("headline");
        assert_eq!(field.key_name(), "headline");
    }

    #[test]
    fn reserved_attr_names_get_underscore() {
        for name in ["From", "Class", "Type", "With", "For", "ID", "Range"] {
            let field = TypedField::new(name);
            assert!(field.attr_name().ends_with('_'), "{name}");
        }
        assert_eq!(TypedField::new("ID").with_attr_name("ident").attr_name(), "ident");
    }

    #[test]
    fn clean_passes_none_and_untyped() {
        let untyped = TypedField::new("Any");
        assert_eq!(untyped.clean(None).unwrap(), None);
        assert_eq!(
            untyped.clean(Some(Value::Int(5))).unwrap(),
            Some(Value::Int(5))
        );
    }

    #[test]
    fn clean_casts_scalars() {
        let int_field = TypedField::new("Count").with_type(ScalarKind::Integer);
        assert_eq!(
            int_field.clean(Some(Value::from("42"))).unwrap(),
            Some(Value::Int(42))
        );
        assert_eq!(
            int_field.clean(Some(Value::Float(3.0))).unwrap(),
            Some(Value::Int(3))
        );

        let err = int_field.clean(Some(Value::from("forty"))).unwrap_err();
        match err {
            EntityError::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "Count");
                assert_eq!(expected, "Integer");
                assert_eq!(actual, "str");
            }
            other => panic!("unexpected error: {other}"),
        }

        let str_field = TypedField::new("Label").with_type(ScalarKind::String);
        assert_eq!(
            str_field.clean(Some(Value::Int(7))).unwrap(),
            Some(Value::from("7"))
        );

        let bool_field = TypedField::new("Flag").with_type(ScalarKind::Boolean);
        assert_eq!(
            bool_field.clean(Some(Value::from("TRUE"))).unwrap(),
            Some(Value::Bool(true))
        );
        assert!(bool_field.clean(Some(Value::Int(1))).is_err());
    }

    #[test]
    fn multiplicity_normalization() {
        let field = TypedField::new("Tags").multiple();

        assert_eq!(
            field.normalize(Some(Value::from("x"))).unwrap(),
            Some(Value::List(vec![Value::from("x")]))
        );
        assert_eq!(field.normalize(None).unwrap(), Some(Value::List(vec![])));

        let typed = TypedField::new("Counts")
            .with_type(ScalarKind::Integer)
            .multiple();
        assert_eq!(
            typed
                .normalize(Some(Value::List(vec![Value::from("1"), Value::Int(2)])))
                .unwrap(),
            Some(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert!(typed
            .normalize(Some(Value::List(vec![Value::from("nope")])))
            .is_err());
    }

    #[test]
    fn single_field_keeps_list_as_is() {
        let field = TypedField::new("Raw");
        let list = Value::List(vec![Value::Int(1)]);
        assert_eq!(field.normalize(Some(list.clone())).unwrap(), Some(list));
    }

    #[test]
    fn unresolved_named_class() {
        let field = TypedField::new("Ghost").with_type(FieldType::named("NeverRegisteredGhost"));
        assert!(matches!(
            field.clean(Some(Value::from("x"))),
            Err(EntityError::UnresolvedClass(name)) if name == "NeverRegisteredGhost"
        ));
        assert!(field.transformer().is_err());
    }

    #[test]
    fn criteria_matching() {
        let multi = TypedField::new("Items").multiple();
        let single = TypedField::new("Title");

        let criteria = FieldCriteria::new().with_multiple(true);
        assert!(criteria.matches(&multi));
        assert!(!criteria.matches(&single));

        let by_key = FieldCriteria::new().with_key_name("title");
        assert!(by_key.matches(&single));
        assert!(FieldCriteria::new().matches(&single));
    }
}
