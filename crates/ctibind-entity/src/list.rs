//! Entity lists
//!
//! An [`EntityList`] is an entity of a list class viewed as a sequence over
//! its single `multiple` field. Every other field of the class still behaves
//! like an ordinary entity field through `Deref`.

use crate::class::EntityClass;
use crate::entity::Entity;
use crate::error::{EntityError, Result};
use crate::field::TypedField;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Sequence view of a list-class entity
///
/// # Example
/// ```
/// use ctibind_entity::{EntityClass, EntityList, ScalarKind, TypedField};
///
/// let item = EntityClass::builder("Tool")
///     .field(TypedField::new("Name").with_type(ScalarKind::String))
///     .constructor(|class, value| ctibind_entity::Entity::new(class).with("name", value))
///     .build()
///     .unwrap();
/// let tools = EntityClass::builder("Tools")
///     .list()
///     .field(TypedField::new("Tool").with_type(&item).multiple())
///     .build()
///     .unwrap();
///
/// let mut list = EntityList::new(&tools).unwrap();
/// list.push("nmap").unwrap();
/// list.push("wireshark").unwrap();
/// assert_eq!(list.len(), 2);
/// assert_eq!(list.to_dict(), serde_json::json!([{"name": "nmap"}, {"name": "wireshark"}]));
/// ```
#[derive(Clone)]
pub struct EntityList {
    inner: Entity,
    field: Arc<TypedField>,
}

impl EntityList {
    /// Empty list of `class`
    ///
    /// # Errors
    /// [`EntityError::NotAList`] if `class` is not a list class
    pub fn new(class: &Arc<EntityClass>) -> Result<Self> {
        Self::from_entity(Entity::new(class))
    }

    /// List of `class` holding `items`, each cleaned against the list field
    ///
    /// # Errors
    /// [`EntityError::NotAList`], or a cleaning error for the first bad item
    pub fn from_items<I, V>(class: &Arc<EntityClass>, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut list = Self::new(class)?;
        list.extend(items)?;
        Ok(list)
    }

    /// View an entity of a list class as a list
    ///
    /// # Errors
    /// [`EntityError::NotAList`] if the entity's class is not a list class
    pub fn from_entity(entity: Entity) -> Result<Self> {
        let Some(field) = entity.class().list_field().cloned() else {
            return Err(EntityError::NotAList(entity.class().name().to_string()));
        };
        Ok(Self { inner: entity, field })
    }

    /// The underlying entity
    #[must_use]
    pub fn into_entity(self) -> Entity {
        self.inner
    }

    fn items(&self) -> &[Value] {
        self.field
            .get(&self.inner)
            .and_then(Value::as_list)
            .unwrap_or_default()
    }

    fn items_mut(&mut self) -> &mut Vec<Value> {
        self.inner.list_mut(&self.field)
    }

    fn clean_item(&self, item: impl Into<Value>) -> Result<Value> {
        let item = item.into();
        let type_name = item.type_name().to_string();
        self.field
            .clean(Some(item))?
            .ok_or_else(|| EntityError::type_mismatch(self.field.name(), "list item", type_name))
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether the list has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Item at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.items().get(index).and_then(Value::as_entity)
    }

    /// Mutable item at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.items_mut().get_mut(index).and_then(Value::as_entity_mut)
    }

    /// Items in order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.items().iter().filter_map(Value::as_entity)
    }

    /// Append an item, cleaning it against the list field
    ///
    /// # Errors
    /// [`EntityError::TypeMismatch`] or [`EntityError::Construction`] if the
    /// item cannot be an instance of the list field's class
    pub fn push(&mut self, item: impl Into<Value>) -> Result<()> {
        let item = self.clean_item(item)?;
        self.items_mut().push(item);
        Ok(())
    }

    /// Insert an item before `index`; indices past the end append
    ///
    /// # Errors
    /// As [`EntityList::push`]
    pub fn insert(&mut self, index: usize, item: impl Into<Value>) -> Result<()> {
        let item = self.clean_item(item)?;
        let items = self.items_mut();
        let index = index.min(items.len());
        items.insert(index, item);
        Ok(())
    }

    /// Replace the item at `index`
    ///
    /// # Errors
    /// [`EntityError::IndexOutOfRange`], or as [`EntityList::push`]
    pub fn set(&mut self, index: usize, item: impl Into<Value>) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(EntityError::IndexOutOfRange { index, len });
        }
        let item = self.clean_item(item)?;
        self.items_mut()[index] = item;
        Ok(())
    }

    /// Remove and return the item at `index`
    ///
    /// # Errors
    /// [`EntityError::IndexOutOfRange`] if `index` is past the end
    pub fn remove(&mut self, index: usize) -> Result<Entity> {
        let len = self.len();
        if index >= len {
            return Err(EntityError::IndexOutOfRange { index, len });
        }
        match self.items_mut().remove(index) {
            Value::Entity(entity) => Ok(*entity),
            other => Err(EntityError::type_mismatch(
                self.field.name(),
                "entity",
                other.type_name(),
            )),
        }
    }

    /// Remove the first item equal to `item`
    pub fn remove_item(&mut self, item: &Entity) -> Option<Entity> {
        let index = self
            .items()
            .iter()
            .position(|candidate| candidate.as_entity() == Some(item))?;
        self.remove(index).ok()
    }

    /// Whether an item equal to `item` is present
    #[must_use]
    pub fn contains(&self, item: &Entity) -> bool {
        self.iter().any(|candidate| candidate == item)
    }

    /// Append every item
    ///
    /// # Errors
    /// As [`EntityList::push`]; items before the bad one stay appended
    pub fn extend<I, V>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for item in items {
            self.push(item)?;
        }
        Ok(())
    }

    /// Dict form of each item
    #[must_use]
    pub fn to_list(&self) -> Vec<JsonValue> {
        self.inner.list_to_json()
    }

    /// List of `class` from the dict forms of its items
    ///
    /// An empty slice yields `None`. Items are reconstructed by the list
    /// field's transformer, with the field class's `xsi:type` as the
    /// fallback type key.
    ///
    /// # Errors
    /// [`EntityError::NotAList`], or any item reconstruction error
    pub fn from_list(class: &Arc<EntityClass>, items: &[JsonValue]) -> Result<Option<Self>> {
        if items.is_empty() {
            return Ok(None);
        }

        let mut list = Self::new(class)?;
        let field = Arc::clone(&list.field);
        let Some(transformer) = field.transformer()? else {
            return Err(EntityError::class_definition(class.name(), "list field has no entity type"));
        };

        let fallback = match field.field_type() {
            Some(crate::field::FieldType::Entity(class_ref)) => {
                class_ref.resolve()?.xsi_type().map(str::to_string)
            }
            _ => None,
        };

        for json in items {
            if let Some(item) = transformer.from_dict(json, fallback.as_deref())? {
                list.push(item)?;
            }
        }
        Ok(Some(list))
    }
}

impl PartialEq for EntityList {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Deref for EntityList {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.inner
    }
}

impl DerefMut for EntityList {
    fn deref_mut(&mut self) -> &mut Entity {
        &mut self.inner
    }
}

impl std::fmt::Debug for EntityList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl From<EntityList> for Value {
    fn from(list: EntityList) -> Self {
        Self::from(list.into_entity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ScalarKind;
    use serde_json::json;

    fn classes() -> (Arc<EntityClass>, Arc<EntityClass>) {
        let item = EntityClass::builder("Item")
            .field(TypedField::new("Name").with_type(ScalarKind::String))
            .constructor(|class, value| Entity::new(class).with("name", value))
            .build()
            .unwrap();
        let list = EntityClass::builder("Items")
            .list()
            .field(TypedField::new("Item").with_type(&item).multiple())
            .build()
            .unwrap();
        (item, list)
    }

    #[test]
    fn new_rejects_plain_class() {
        let (item, _) = classes();
        assert!(matches!(EntityList::new(&item), Err(EntityError::NotAList(_))));
    }

    #[test]
    fn push_casts_scalars_through_constructor() {
        let (item, list_class) = classes();
        let mut list = EntityList::new(&list_class).unwrap();
        list.push("Alpha").unwrap();
        list.push(Entity::new(&item).with("name", "Beta").unwrap()).unwrap();

        let names: Vec<_> = list.iter().filter_map(|e| e.get("name")).collect();
        assert_eq!(names, vec![&Value::from("Alpha"), &Value::from("Beta")]);
        assert!(list.push(3.5).is_ok());
    }

    #[test]
    fn index_operations() {
        let (_, list_class) = classes();
        let mut list = EntityList::from_items(&list_class, ["a", "c"]).unwrap();

        list.insert(1, "b").unwrap();
        list.insert(99, "d").unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list.get(1).and_then(|e| e.get("name")), Some(&Value::from("b")));

        list.set(3, "z").unwrap();
        assert!(matches!(
            list.set(4, "x"),
            Err(EntityError::IndexOutOfRange { index: 4, len: 4 })
        ));

        let removed = list.remove(0).unwrap();
        assert_eq!(removed.get("name"), Some(&Value::from("a")));
        assert_eq!(list.len(), 3);
        assert!(list.remove(3).is_err());
    }

    #[test]
    fn remove_item_by_equality() {
        let (item, list_class) = classes();
        let mut list = EntityList::from_items(&list_class, ["x", "y"]).unwrap();
        let target = Entity::new(&item).with("name", "y").unwrap();

        assert!(list.contains(&target));
        assert!(list.remove_item(&target).is_some());
        assert!(!list.contains(&target));
        assert!(list.remove_item(&target).is_none());
    }

    #[test]
    fn remove_item_skips_raw_values_in_place() {
        let (item, list_class) = classes();
        let mut list = EntityList::from_items(&list_class, ["A", "B"]).unwrap();
        let field = Arc::clone(list_class.list_field().unwrap());
        if let Some(Value::List(items)) = list.get_field_mut(&field) {
            items.insert(0, Value::from("junk"));
        }
        assert_eq!(list.len(), 3);

        let b = Entity::new(&item).with("name", "B").unwrap();
        let removed = list.remove_item(&b).unwrap();
        assert_eq!(removed, b);
        assert!(!list.contains(&b));
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).and_then(|e| e.get("name")), Some(&Value::from("A")));
    }

    #[test]
    fn dict_as_list_round_trip() {
        let (_, list_class) = classes();
        let list = EntityList::from_items(&list_class, ["one", "two"]).unwrap();
        assert_eq!(list.to_list(), vec![json!({"name": "one"}), json!({"name": "two"})]);

        let back = Entity::from_dict(&list_class, &list.to_dict()).unwrap().unwrap();
        assert_eq!(EntityList::from_entity(back).unwrap(), list);

        assert!(EntityList::from_list(&list_class, &[]).unwrap().is_none());
        assert!(Entity::from_dict(&list_class, &json!([])).unwrap().is_none());
    }

    #[test]
    fn scalar_items_in_dict_use_constructor() {
        let (_, list_class) = classes();
        let list = EntityList::from_list(&list_class, &[json!("plain")])
            .unwrap()
            .unwrap();
        assert_eq!(list.get(0).and_then(|e| e.get("name")), Some(&Value::from("plain")));
    }

    #[test]
    fn empty_list_drops_from_parent_binding() {
        let (_, list_class) = classes();
        let parent = EntityClass::builder("Holder")
            .field(TypedField::new("Items").with_type(&list_class))
            .field(TypedField::new("Label"))
            .build()
            .unwrap();

        let empty = EntityList::new(&list_class).unwrap();
        let holder = Entity::new(&parent)
            .with("items", empty)
            .unwrap()
            .with("label", "x")
            .unwrap();

        let obj = holder.to_obj();
        assert!(obj.get("Items").is_some_and(crate::BindingValue::is_null));
        assert_eq!(holder.to_dict(), json!({"label": "x"}));
    }
}
