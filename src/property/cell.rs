use std::{
    any::Any,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    animation::keyframe::KeyFrameAnimation,
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::PropertyId,
    property::core_property::PropertyValue,
};

pub(crate) type Sampler<T> = fn(&KeyFrameAnimation<T>, Duration) -> Option<T>;

/// Change notification delivered to subscribers of a property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyEvent<T> {
    /// The static value changed to the carried value.
    ValueChanged(T),
    /// A keyframe track was attached, replaced or detached (`None`).
    AnimationChanged(Option<Arc<KeyFrameAnimation<T>>>),
}

/// Fan-out list of channel senders. Disconnected receivers are pruned on the next emit.
pub(crate) struct Observers<E> {
    senders: Mutex<Vec<Sender<E>>>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> Observers<E> {
    pub(crate) fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: E) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Storage for one property value on one object.
pub(crate) struct PropertyCell<T> {
    id: PropertyId,
    name: Arc<str>,
    notifies: bool,
    value: RwLock<T>,
    animation: RwLock<Option<Arc<KeyFrameAnimation<T>>>>,
    sampler: Option<Sampler<T>>,
    value_observers: Observers<PropertyEvent<T>>,
    animation_observers: Observers<Option<Arc<KeyFrameAnimation<T>>>>,
    owner_feed: Arc<Observers<PropertyId>>,
}

impl<T: PropertyValue> PropertyCell<T> {
    pub(crate) fn new(
        id: PropertyId,
        name: Arc<str>,
        notifies: bool,
        initial: T,
        sampler: Option<Sampler<T>>,
        owner_feed: Arc<Observers<PropertyId>>,
    ) -> Self {
        Self {
            id,
            name,
            notifies,
            value: RwLock::new(initial),
            animation: RwLock::new(None),
            sampler,
            value_observers: Observers::default(),
            animation_observers: Observers::default(),
            owner_feed,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn get(&self) -> T {
        read(&self.value).clone()
    }

    /// Sampled value at `time`; the static value when no track covers it.
    pub(crate) fn get_at(&self, time: Duration) -> T {
        if let Some(sampler) = self.sampler
            && let Some(anim) = read(&self.animation).as_ref()
            && let Some(v) = sampler(anim, time)
        {
            return v;
        }
        self.get()
    }

    /// Store `value`. Subscribers hear about it only when it differs from the current value.
    pub(crate) fn set(&self, value: T) -> bool {
        {
            let mut slot = write(&self.value);
            if *slot == value {
                return false;
            }
            *slot = value.clone();
        }
        self.value_observers.emit(PropertyEvent::ValueChanged(value));
        self.touch();
        true
    }

    pub(crate) fn animation(&self) -> Option<Arc<KeyFrameAnimation<T>>> {
        read(&self.animation).clone()
    }

    pub(crate) fn set_animation(
        &self,
        animation: Option<Arc<KeyFrameAnimation<T>>>,
    ) -> OpflowResult<()> {
        if self.sampler.is_none() {
            return Err(OpflowError::validation(format!(
                "property '{}' is not animatable",
                self.name
            )));
        }
        {
            let mut slot = write(&self.animation);
            let unchanged = match (slot.as_ref(), animation.as_ref()) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if unchanged {
                return Ok(());
            }
            *slot = animation.clone();
        }
        self.animation_observers.emit(animation.clone());
        self.value_observers
            .emit(PropertyEvent::AnimationChanged(animation));
        self.touch();
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> Receiver<PropertyEvent<T>> {
        self.value_observers.subscribe()
    }

    pub(crate) fn subscribe_animation(&self) -> Receiver<Option<Arc<KeyFrameAnimation<T>>>> {
        self.animation_observers.subscribe()
    }

    fn touch(&self) {
        if self.notifies {
            self.owner_feed.emit(self.id);
        }
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.value_observers.len()
    }
}

/// Object-safe view of a [`PropertyCell`], used by stores, persistence and editors.
pub(crate) trait ErasedCell: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn is_animatable(&self) -> bool;
    fn has_animation(&self) -> bool;
    fn set_any(&self, value: &dyn Any, found: &'static str) -> OpflowResult<bool>;
    fn value_json(&self) -> OpflowResult<serde_json::Value>;
    fn sample_json(&self, time: Duration) -> OpflowResult<serde_json::Value>;
    fn set_value_json(&self, value: &serde_json::Value) -> OpflowResult<bool>;
    fn animation_json(&self) -> OpflowResult<Option<serde_json::Value>>;
    fn set_animation_json(&self, value: Option<&serde_json::Value>) -> OpflowResult<()>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: PropertyValue> ErasedCell for PropertyCell<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_animatable(&self) -> bool {
        self.sampler.is_some()
    }

    fn has_animation(&self) -> bool {
        read(&self.animation).is_some()
    }

    fn set_any(&self, value: &dyn Any, found: &'static str) -> OpflowResult<bool> {
        match value.downcast_ref::<T>() {
            Some(v) => Ok(self.set(v.clone())),
            None => Err(OpflowError::type_mismatch(
                self.name(),
                std::any::type_name::<T>(),
                found,
            )),
        }
    }

    fn value_json(&self) -> OpflowResult<serde_json::Value> {
        Ok(serde_json::to_value(self.get())?)
    }

    fn sample_json(&self, time: Duration) -> OpflowResult<serde_json::Value> {
        Ok(serde_json::to_value(self.get_at(time))?)
    }

    fn set_value_json(&self, value: &serde_json::Value) -> OpflowResult<bool> {
        let v = serde_json::from_value::<T>(value.clone()).map_err(|_| {
            OpflowError::type_mismatch(self.name(), std::any::type_name::<T>(), json_kind(value))
        })?;
        Ok(self.set(v))
    }

    fn animation_json(&self) -> OpflowResult<Option<serde_json::Value>> {
        self.animation()
            .map(|a| serde_json::to_value(a.as_ref()))
            .transpose()
            .map_err(OpflowError::from)
    }

    fn set_animation_json(&self, value: Option<&serde_json::Value>) -> OpflowResult<()> {
        let anim = value
            .map(|v| serde_json::from_value::<KeyFrameAnimation<T>>(v.clone()).map(Arc::new))
            .transpose()?;
        self.set_animation(anim)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "json null",
        serde_json::Value::Bool(_) => "json bool",
        serde_json::Value::Number(_) => "json number",
        serde_json::Value::String(_) => "json string",
        serde_json::Value::Array(_) => "json array",
        serde_json::Value::Object(_) => "json object",
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "../../tests/unit/property/cell.rs"]
mod tests;
