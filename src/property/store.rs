use std::{any::Any, collections::HashMap, sync::Arc, time::Duration};

use crossbeam_channel::Receiver;
use rayon::prelude::*;

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::PropertyId,
    property::{
        abstract_property::{AnimatableProperty, EditableProperty, PlainProperty},
        cell::{ErasedCell, Observers, PropertyCell},
        core_property::{CoreProperty, PropertyMeta, PropertyValue},
        registry::{PropertyOwner, PropertyRegistry},
    },
};

struct StoreEntry {
    meta: Arc<PropertyMeta>,
    cell: Arc<dyn ErasedCell>,
}

/// Per-object property values, one cell per property declared by the owner.
pub struct PropertyStore {
    owner: &'static str,
    entries: Vec<StoreEntry>,
    index: HashMap<PropertyId, usize>,
    feed: Arc<Observers<PropertyId>>,
}

impl PropertyStore {
    /// Fresh store for `O`, every property at its declared default.
    pub fn for_owner<O: PropertyOwner>(registry: &PropertyRegistry) -> OpflowResult<Self> {
        if !registry.is_registered::<O>() {
            return Err(OpflowError::validation(format!(
                "property owner '{}' is not registered",
                O::OWNER
            )));
        }
        Ok(Self::from_metas(O::OWNER, registry.properties_of(O::OWNER)))
    }

    fn from_metas(owner: &'static str, metas: &[Arc<PropertyMeta>]) -> Self {
        let feed = Arc::new(Observers::default());
        let entries: Vec<StoreEntry> = metas
            .iter()
            .map(|meta| StoreEntry {
                meta: meta.clone(),
                cell: (meta.make_cell)(&feed),
            })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.meta.id, i))
            .collect();
        Self {
            owner,
            entries,
            index,
            feed,
        }
    }

    /// Owner type name.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Number of property slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of properties declared with `notifies()`, pushed whenever one of them changes.
    pub fn changes(&self) -> Receiver<PropertyId> {
        self.feed.subscribe()
    }

    /// Plain view of `property`.
    pub fn plain<T: PropertyValue>(
        &self,
        property: &CoreProperty<T>,
    ) -> OpflowResult<PlainProperty<T>> {
        Ok(PlainProperty::new(property.clone(), self.cell(property)?))
    }

    /// Animatable view of `property`; fails when it was not declared animatable.
    pub fn animatable<T: PropertyValue>(
        &self,
        property: &CoreProperty<T>,
    ) -> OpflowResult<AnimatableProperty<T>> {
        if !property.is_animatable() {
            return Err(OpflowError::validation(format!(
                "property '{}.{}' is not animatable",
                property.owner(),
                property.name()
            )));
        }
        Ok(AnimatableProperty::new(
            property.clone(),
            self.cell(property)?,
        ))
    }

    /// Current value of `property`.
    pub fn get<T: PropertyValue>(&self, property: &CoreProperty<T>) -> OpflowResult<T> {
        Ok(self.cell(property)?.get())
    }

    /// Value of `property` at `time`, honouring any keyframe track.
    pub fn get_at<T: PropertyValue>(
        &self,
        property: &CoreProperty<T>,
        time: Duration,
    ) -> OpflowResult<T> {
        Ok(self.cell(property)?.get_at(time))
    }

    /// Replace the static value of `property`.
    pub fn set<T: PropertyValue>(&self, property: &CoreProperty<T>, value: T) -> OpflowResult<()> {
        self.cell(property)?.set(value);
        Ok(())
    }

    /// Type-erased view of the slot with `id`.
    pub fn editable(&self, id: PropertyId) -> Option<Arc<dyn EditableProperty>> {
        let entry = &self.entries[*self.index.get(&id)?];
        Some(Arc::new(StoreProperty {
            meta: entry.meta.clone(),
            cell: entry.cell.clone(),
        }))
    }

    /// Every property in declaration order, for editors and serialization.
    pub fn editables(&self) -> Vec<Arc<dyn EditableProperty>> {
        self.entries
            .iter()
            .map(|e| {
                Arc::new(StoreProperty {
                    meta: e.meta.clone(),
                    cell: e.cell.clone(),
                }) as Arc<dyn EditableProperty>
            })
            .collect()
    }

    fn entry(&self, id: PropertyId) -> OpflowResult<&StoreEntry> {
        self.index
            .get(&id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| {
                OpflowError::validation(format!(
                    "property #{} does not belong to '{}'",
                    id.0, self.owner
                ))
            })
    }

    fn cell<T: PropertyValue>(
        &self,
        property: &CoreProperty<T>,
    ) -> OpflowResult<Arc<PropertyCell<T>>> {
        let entry = self.entry(property.id())?;
        if !entry.meta.is_type::<T>() {
            return Err(OpflowError::type_mismatch(
                property.name(),
                entry.meta.type_name(),
                std::any::type_name::<T>(),
            ));
        }
        entry
            .cell
            .clone()
            .into_any()
            .downcast::<PropertyCell<T>>()
            .map_err(|_| {
                OpflowError::type_mismatch(
                    property.name(),
                    entry.meta.type_name(),
                    std::any::type_name::<T>(),
                )
            })
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("owner", &self.owner)
            .field("properties", &self.entries.len())
            .finish()
    }
}

struct StoreProperty {
    meta: Arc<PropertyMeta>,
    cell: Arc<dyn ErasedCell>,
}

impl EditableProperty for StoreProperty {
    fn id(&self) -> PropertyId {
        self.meta.id()
    }

    fn name(&self) -> &str {
        self.meta.name()
    }

    fn owner(&self) -> &'static str {
        self.meta.owner()
    }

    fn type_name(&self) -> &'static str {
        self.cell.type_name()
    }

    fn is_animatable(&self) -> bool {
        self.cell.is_animatable()
    }

    fn has_animation(&self) -> bool {
        self.cell.has_animation()
    }

    fn default_json(&self) -> serde_json::Value {
        self.meta.default_json().clone()
    }

    fn value_json(&self) -> OpflowResult<serde_json::Value> {
        self.cell.value_json()
    }

    fn sample_json(&self, time: Duration) -> OpflowResult<serde_json::Value> {
        self.cell.sample_json(time)
    }

    fn set_value_json(&self, value: &serde_json::Value) -> OpflowResult<()> {
        self.cell.set_value_json(value).map(|_| ())
    }

    fn set_value_any(&self, value: &dyn Any) -> OpflowResult<()> {
        self.cell.set_any(value, "a value of another type").map(|_| ())
    }

    fn animation_json(&self) -> OpflowResult<Option<serde_json::Value>> {
        self.cell.animation_json()
    }

    fn set_animation_json(&self, value: Option<&serde_json::Value>) -> OpflowResult<()> {
        self.cell.set_animation_json(value)
    }
}

/// An object whose persistent state lives in a [`PropertyStore`].
pub trait CoreObject: Send + Sync {
    /// Backing store.
    fn store(&self) -> &PropertyStore;

    /// Owner type name, taken from the store.
    fn type_name(&self) -> &'static str {
        self.store().owner()
    }
}

/// Sample `properties` at `time` as `(name, json)` pairs, in input order.
pub fn sample_properties(
    properties: &[Arc<dyn EditableProperty>],
    time: Duration,
    parallel: bool,
) -> OpflowResult<Vec<(String, serde_json::Value)>> {
    let sample = |p: &Arc<dyn EditableProperty>| -> OpflowResult<(String, serde_json::Value)> {
        Ok((p.name().to_owned(), p.sample_json(time)?))
    };
    if parallel {
        properties.par_iter().map(sample).collect()
    } else {
        properties.iter().map(sample).collect()
    }
}

/// Serialize every property of `object`.
///
/// Layout: `{"type": <owner>, "properties": {name: value}, "animations": {name: track}}`.
pub fn write_core_object(object: &dyn CoreObject) -> OpflowResult<serde_json::Value> {
    let mut properties = serde_json::Map::new();
    let mut animations = serde_json::Map::new();
    for p in object.store().editables() {
        properties.insert(p.name().to_owned(), p.value_json()?);
        if let Some(track) = p.animation_json()? {
            animations.insert(p.name().to_owned(), track);
        }
    }
    Ok(serde_json::json!({
        "type": object.type_name(),
        "properties": properties,
        "animations": animations,
    }))
}

/// Restore state written by [`write_core_object`].
///
/// Unknown property names are ignored; missing ones keep their current value. Animatable
/// properties without a track in `json` lose any track they had.
pub fn read_core_object(object: &dyn CoreObject, json: &serde_json::Value) -> OpflowResult<()> {
    let ty = json
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| OpflowError::serde("object json is missing 'type'"))?;
    if ty != object.type_name() {
        return Err(OpflowError::serde(format!(
            "expected object of type '{}', found '{ty}'",
            object.type_name()
        )));
    }

    let properties = json.get("properties").and_then(serde_json::Value::as_object);
    let animations = json.get("animations").and_then(serde_json::Value::as_object);
    for p in object.store().editables() {
        if let Some(v) = properties.and_then(|m| m.get(p.name())) {
            p.set_value_json(v)?;
        }
        if p.is_animatable() {
            p.set_animation_json(animations.and_then(|m| m.get(p.name())))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/property/store.rs"]
mod tests;
