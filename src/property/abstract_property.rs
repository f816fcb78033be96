use std::{any::Any, sync::Arc, time::Duration};

use crossbeam_channel::Receiver;

use crate::{
    animation::keyframe::KeyFrameAnimation,
    foundation::error::OpflowResult,
    foundation::ids::PropertyId,
    property::{
        cell::{ErasedCell, PropertyCell, PropertyEvent},
        core_property::{CoreProperty, PropertyValue},
    },
};

/// Uniform typed access to one property of one object.
pub trait AbstractProperty<T: PropertyValue>: Send + Sync {
    /// Handle this view is bound to.
    fn property(&self) -> &CoreProperty<T>;

    /// Static value.
    fn get_value(&self) -> T;

    /// Value at `time`. Plain properties ignore `time`.
    fn get_value_at(&self, time: Duration) -> T;

    /// Replace the static value. Never touches an attached track.
    fn set_value(&self, value: T);

    /// Stream of change events. Dropping the receiver unsubscribes.
    fn get_observable(&self) -> Receiver<PropertyEvent<T>>;

    /// Declared default.
    fn default_value(&self) -> T {
        self.property().default_value()
    }

    /// Dynamic setter. Rejects values whose runtime type is not `T` and leaves the value as is.
    fn set_value_dyn(&self, value: &dyn Any) -> OpflowResult<()>;
}

/// Object-safe view used where the value type is not known statically.
pub trait EditableProperty: Send + Sync {
    /// Registered id.
    fn id(&self) -> PropertyId;
    /// Declared name.
    fn name(&self) -> &str;
    /// Declaring owner.
    fn owner(&self) -> &'static str;
    /// Value type name.
    fn type_name(&self) -> &'static str;
    /// Whether a track may be attached.
    fn is_animatable(&self) -> bool;
    /// Whether a track is attached.
    fn has_animation(&self) -> bool;
    /// Declared default as JSON.
    fn default_json(&self) -> serde_json::Value;
    /// Static value as JSON.
    fn value_json(&self) -> OpflowResult<serde_json::Value>;
    /// Value at `time` as JSON.
    fn sample_json(&self, time: Duration) -> OpflowResult<serde_json::Value>;
    /// Set the static value from JSON. Type errors leave the value unchanged.
    fn set_value_json(&self, value: &serde_json::Value) -> OpflowResult<()>;
    /// Type-checked dynamic setter.
    fn set_value_any(&self, value: &dyn Any) -> OpflowResult<()>;
    /// Attached track as JSON, if any.
    fn animation_json(&self) -> OpflowResult<Option<serde_json::Value>>;
    /// Attach (`Some`) or detach (`None`) a track from JSON.
    fn set_animation_json(&self, value: Option<&serde_json::Value>) -> OpflowResult<()>;
}

/// Static-only access to a property.
pub struct PlainProperty<T> {
    property: CoreProperty<T>,
    cell: Arc<PropertyCell<T>>,
}

impl<T: PropertyValue> PlainProperty<T> {
    pub(crate) fn new(property: CoreProperty<T>, cell: Arc<PropertyCell<T>>) -> Self {
        Self { property, cell }
    }

    /// Like [`AbstractProperty::set_value_dyn`] but reports the offered type on mismatch.
    /// Set from a value of any type. Wrong types are a [`crate::OpflowError::TypeMismatch`].
    pub fn try_set<V: Any>(&self, value: &V) -> OpflowResult<()> {
        self.cell
            .set_any(value, std::any::type_name::<V>())
            .map(|_| ())
    }
}

impl<T: PropertyValue> AbstractProperty<T> for PlainProperty<T> {
    fn property(&self) -> &CoreProperty<T> {
        &self.property
    }

    fn get_value(&self) -> T {
        self.cell.get()
    }

    fn get_value_at(&self, _time: Duration) -> T {
        self.cell.get()
    }

    fn set_value(&self, value: T) {
        self.cell.set(value);
    }

    fn get_observable(&self) -> Receiver<PropertyEvent<T>> {
        self.cell.subscribe()
    }

    fn set_value_dyn(&self, value: &dyn Any) -> OpflowResult<()> {
        self.cell.set_any(value, "a value of another type").map(|_| ())
    }
}

/// Property that may be driven by a keyframe track.
pub struct AnimatableProperty<T> {
    property: CoreProperty<T>,
    cell: Arc<PropertyCell<T>>,
}

impl<T: PropertyValue> AnimatableProperty<T> {
    pub(crate) fn new(property: CoreProperty<T>, cell: Arc<PropertyCell<T>>) -> Self {
        Self { property, cell }
    }

    /// Currently attached track.
    pub fn animation(&self) -> Option<Arc<KeyFrameAnimation<T>>> {
        self.cell.animation()
    }

    /// Attach, replace or detach (`None`) the keyframe track.
    pub fn set_animation(&self, animation: Option<KeyFrameAnimation<T>>) -> OpflowResult<()> {
        self.cell.set_animation(animation.map(Arc::new))
    }

    /// Attach a track that may be shared with other properties.
    pub fn set_shared_animation(
        &self,
        animation: Option<Arc<KeyFrameAnimation<T>>>,
    ) -> OpflowResult<()> {
        self.cell.set_animation(animation)
    }

    /// Stream of track replacements only.
    pub fn observe_animation(&self) -> Receiver<Option<Arc<KeyFrameAnimation<T>>>> {
        self.cell.subscribe_animation()
    }

    /// Set from a type-erased value; fails when `V` is not the property type.
    pub fn try_set<V: Any>(&self, value: &V) -> OpflowResult<()> {
        self.cell
            .set_any(value, std::any::type_name::<V>())
            .map(|_| ())
    }
}

impl<T: PropertyValue> AbstractProperty<T> for AnimatableProperty<T> {
    fn property(&self) -> &CoreProperty<T> {
        &self.property
    }

    fn get_value(&self) -> T {
        self.cell.get()
    }

    fn get_value_at(&self, time: Duration) -> T {
        self.cell.get_at(time)
    }

    fn set_value(&self, value: T) {
        self.cell.set(value);
    }

    fn get_observable(&self) -> Receiver<PropertyEvent<T>> {
        self.cell.subscribe()
    }

    fn set_value_dyn(&self, value: &dyn Any) -> OpflowResult<()> {
        self.cell.set_any(value, "a value of another type").map(|_| ())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/property/abstract_property.rs"]
mod tests;
