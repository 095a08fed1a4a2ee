//! Entity classes
//!
//! An [`EntityClass`] declares the shape of an entity: its fields (own and
//! inherited), its namespace binding and how it is constructed from a bare
//! value. Classes are built once at start-up and shared behind `Arc`.
//!
//! Provides [`ClassRegistry`] for name-based lookup; the process-wide
//! instance backs [`FieldType::named`](crate::FieldType::named) references.

use crate::entity::Entity;
use crate::error::{EntityError, Result};
use crate::field::TypedField;
use crate::value::{BindingObject, Value};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// Single-argument constructor: builds an instance of the class from a bare value
pub type Constructor = Arc<dyn Fn(&Arc<EntityClass>, Value) -> Result<Entity> + Send + Sync>;

/// Adds extra keys to an entity's dict representation
pub type FinalizeDict = Arc<dyn Fn(&Entity, &mut JsonMap<String, JsonValue>) + Send + Sync>;

/// Adds extra attributes to an entity's binding object
pub type FinalizeObj = Arc<dyn Fn(&Entity, &mut BindingObject) + Send + Sync>;

/// Whether instances behave as plain entities or as sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    /// Plain entity
    #[default]
    Entity,
    /// Sequence over exactly one `multiple` entity-typed field
    List,
}

/// Declaration of an entity type
pub struct EntityClass {
    name: String,
    parent: Option<Arc<EntityClass>>,
    typed_fields: Vec<Arc<TypedField>>,
    namespace: Option<String>,
    xsi_ns: Option<String>,
    xsi_type: Option<String>,
    binding_class: String,
    kind: ClassKind,
    try_cast: bool,
    constructor: Option<Constructor>,
    finalize_dict: Option<FinalizeDict>,
    finalize_obj: Option<FinalizeObj>,
    list_field: Option<Arc<TypedField>>,
}

impl EntityClass {
    /// Start declaring a class
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityClassBuilder {
        EntityClassBuilder::new(name)
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class, if any
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<EntityClass>> {
        self.parent.as_ref()
    }

    /// Fields of this class: inherited first, then own
    ///
    /// A field whose attribute name is redeclared by a subclass is replaced
    /// by the subclass's field.
    #[inline]
    #[must_use]
    pub fn typed_fields(&self) -> &[Arc<TypedField>] {
        &self.typed_fields
    }

    /// Field with the given attribute name
    #[must_use]
    pub fn field(&self, attr: &str) -> Option<&Arc<TypedField>> {
        self.typed_fields.iter().find(|f| f.attr_name() == attr)
    }

    /// Namespace uri this class is bound to
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Namespace alias declared by this class
    #[inline]
    #[must_use]
    pub fn xsi_ns(&self) -> Option<&str> {
        self.xsi_ns.as_deref()
    }

    /// `xsi:type` qualified name, as `alias:TypeName`
    #[inline]
    #[must_use]
    pub fn xsi_type(&self) -> Option<&str> {
        self.xsi_type.as_deref()
    }

    /// Binding class name of produced binding objects
    #[inline]
    #[must_use]
    pub fn binding_class(&self) -> &str {
        &self.binding_class
    }

    /// Plain entity or list
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Whether instances are entity lists
    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.kind == ClassKind::List
    }

    /// The single `multiple` field of a list class
    #[inline]
    #[must_use]
    pub fn list_field(&self) -> Option<&Arc<TypedField>> {
        self.list_field.as_ref()
    }

    /// Whether a field may coerce foreign values by calling the constructor
    #[inline]
    #[must_use]
    pub fn is_castable(&self) -> bool {
        self.try_cast && self.constructor.is_some()
    }

    /// Whether the dict representation of a list class is a bare sequence
    ///
    /// True when the list field is the only field.
    #[inline]
    #[must_use]
    pub fn dict_as_list(&self) -> bool {
        self.is_list() && self.typed_fields.len() == 1
    }

    /// This class followed by each ancestor, nearest first
    pub fn ancestry(self: &Arc<Self>) -> impl Iterator<Item = &Arc<EntityClass>> {
        std::iter::successors(Some(self), |class| class.parent.as_ref())
    }

    /// Whether `self` is `other` or descends from it
    #[must_use]
    pub fn is_subclass_of(&self, other: &EntityClass) -> bool {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
            .any(|class| std::ptr::eq(class, other))
    }

    /// Build an instance from a bare value through the class constructor
    ///
    /// # Errors
    /// [`EntityError::Construction`] if there is no constructor or it rejects the value
    pub fn construct(self: &Arc<Self>, value: Value) -> Result<Entity> {
        let Some(constructor) = &self.constructor else {
            return Err(EntityError::construction(
                &self.name,
                value.type_name(),
                "class has no single-argument constructor",
            ));
        };

        let value_type = value.type_name().to_string();
        constructor(self, value).map_err(|err| match err {
            err @ EntityError::Construction { .. } => err,
            other => EntityError::construction(&self.name, value_type, other.to_string()),
        })
    }

    pub(crate) fn finalize_dict(&self, entity: &Entity, dict: &mut JsonMap<String, JsonValue>) {
        if let Some(hook) = &self.finalize_dict {
            hook(entity, dict);
        }
    }

    pub(crate) fn finalize_obj(&self, entity: &Entity, obj: &mut BindingObject) {
        if let Some(hook) = &self.finalize_obj {
            hook(entity, obj);
        }
    }
}

impl fmt::Debug for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.typed_fields.iter().map(|f| f.name()).collect();
        f.debug_struct("EntityClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("fields", &fields)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`EntityClass`]
pub struct EntityClassBuilder {
    name: String,
    parent: Option<Arc<EntityClass>>,
    fields: Vec<TypedField>,
    namespace: Option<String>,
    xsi_ns: Option<String>,
    xsi_type: Option<String>,
    binding_class: Option<String>,
    kind: ClassKind,
    try_cast: Option<bool>,
    constructor: Option<Constructor>,
    finalize_dict: Option<FinalizeDict>,
    finalize_obj: Option<FinalizeObj>,
}

impl EntityClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            namespace: None,
            xsi_ns: None,
            xsi_type: None,
            binding_class: None,
            kind: ClassKind::Entity,
            try_cast: None,
            constructor: None,
            finalize_dict: None,
            finalize_obj: None,
        }
    }

    /// Inherit fields and the namespace chain from `parent`
    #[must_use]
    pub fn parent(mut self, parent: &Arc<EntityClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare a field
    #[must_use]
    pub fn field(mut self, field: TypedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Bind the class to a namespace uri
    #[must_use]
    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }

    /// Declare the namespace alias
    #[must_use]
    pub fn xsi_ns(mut self, alias: impl Into<String>) -> Self {
        self.xsi_ns = Some(alias.into());
        self
    }

    /// Declare the `xsi:type` qualified name
    #[must_use]
    pub fn xsi_type(mut self, qname: impl Into<String>) -> Self {
        self.xsi_type = Some(qname.into());
        self
    }

    /// Binding class name; defaults to the class name
    #[must_use]
    pub fn binding_class(mut self, name: impl Into<String>) -> Self {
        self.binding_class = Some(name.into());
        self
    }

    /// Make this a list class
    #[must_use]
    pub fn list(mut self) -> Self {
        self.kind = ClassKind::List;
        self
    }

    /// Whether fields may cast foreign values through the constructor
    ///
    /// Defaults to true for entity classes and false for list classes.
    #[must_use]
    pub fn try_cast(mut self, try_cast: bool) -> Self {
        self.try_cast = Some(try_cast);
        self
    }

    /// Single-argument constructor
    #[must_use]
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Arc<EntityClass>, Value) -> Result<Entity> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// Hook adding extra keys to dict output
    #[must_use]
    pub fn finalize_dict<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Entity, &mut JsonMap<String, JsonValue>) + Send + Sync + 'static,
    {
        self.finalize_dict = Some(Arc::new(hook));
        self
    }

    /// Hook adding extra attributes to binding output
    #[must_use]
    pub fn finalize_obj<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Entity, &mut BindingObject) + Send + Sync + 'static,
    {
        self.finalize_obj = Some(Arc::new(hook));
        self
    }

    /// Finish the declaration
    ///
    /// # Errors
    /// [`EntityError::ClassDefinition`] if two own fields share an attribute
    /// name, or a list class does not have exactly one `multiple` field with
    /// an entity type
    pub fn build(self) -> Result<Arc<EntityClass>> {
        let mut typed_fields: Vec<Arc<TypedField>> = self
            .parent
            .as_ref()
            .map(|parent| parent.typed_fields.clone())
            .unwrap_or_default();

        let mut own_attrs: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let field = Arc::new(field);
            let attr = field.attr_name().into_owned();
            if own_attrs.contains(&attr) {
                return Err(EntityError::class_definition(
                    &self.name,
                    format!("field '{attr}' declared twice"),
                ));
            }

            match typed_fields.iter().position(|f| f.attr_name() == attr) {
                Some(pos) => typed_fields[pos] = field,
                None => typed_fields.push(field),
            }
            own_attrs.push(attr);
        }

        let list_field = if self.kind == ClassKind::List {
            Some(Self::validate_list_field(&self.name, &typed_fields)?)
        } else {
            None
        };

        Ok(Arc::new(EntityClass {
            binding_class: self.binding_class.unwrap_or_else(|| self.name.clone()),
            try_cast: self.try_cast.unwrap_or(self.kind == ClassKind::Entity),
            name: self.name,
            parent: self.parent,
            typed_fields,
            namespace: self.namespace,
            xsi_ns: self.xsi_ns,
            xsi_type: self.xsi_type,
            kind: self.kind,
            constructor: self.constructor,
            finalize_dict: self.finalize_dict,
            finalize_obj: self.finalize_obj,
            list_field,
        }))
    }

    fn validate_list_field(name: &str, fields: &[Arc<TypedField>]) -> Result<Arc<TypedField>> {
        let mut multiple = fields.iter().filter(|f| f.is_multiple());

        let (Some(field), None) = (multiple.next(), multiple.next()) else {
            return Err(EntityError::class_definition(
                name,
                "a list class needs exactly one multiple field",
            ));
        };

        if !field.field_type().is_some_and(|t| t.is_entity()) {
            return Err(EntityError::class_definition(
                name,
                format!("list field '{}' must have an entity type", field.name()),
            ));
        }

        Ok(Arc::clone(field))
    }
}

/// Name → class registry
#[derive(Debug, Default, Clone)]
pub struct ClassRegistry {
    classes: IndexMap<String, Arc<EntityClass>>,
}

impl ClassRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its name, replacing any previous one
    pub fn register(&mut self, class: &Arc<EntityClass>) {
        self.classes.insert(class.name().to_string(), Arc::clone(class));
    }

    /// Class registered under `name`
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<EntityClass>> {
        self.classes.get(name)
    }

    /// First class declaring the given `xsi:type`
    #[must_use]
    pub fn by_xsi_type(&self, xsi_type: &str) -> Option<&Arc<EntityClass>> {
        self.classes
            .values()
            .find(|class| class.xsi_type() == Some(xsi_type))
    }

    /// Check if a class is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registered class names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }

    /// Get number of registered classes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

static CLASS_REGISTRY: Lazy<RwLock<ClassRegistry>> = Lazy::new(|| RwLock::new(ClassRegistry::new()));

/// Register a class with the process-wide registry
pub fn register_class(class: &Arc<EntityClass>) {
    CLASS_REGISTRY.write().register(class);
}

/// Class registered process-wide under `name`
#[must_use]
pub fn lookup_class(name: &str) -> Option<Arc<EntityClass>> {
    CLASS_REGISTRY.read().get(name).cloned()
}
