use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    foundation::ids::PropertyId,
    property::cell::{ErasedCell, Observers},
};

/// Bound shared by every value that can live in a property slot.
pub trait PropertyValue:
    Clone
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + serde::Serialize
    + serde::de::DeserializeOwned
    + 'static
{
}

impl<T> PropertyValue for T where
    T: Clone
        + PartialEq
        + fmt::Debug
        + Send
        + Sync
        + serde::Serialize
        + serde::de::DeserializeOwned
        + 'static
{
}

/// Static capabilities declared at registration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PropertyFlags {
    /// A keyframe track may be attached.
    pub animatable: bool,
    /// Changes are also published on the owning store's change feed.
    pub notifies: bool,
}

pub(crate) type CellFactory =
    Arc<dyn Fn(&Arc<Observers<PropertyId>>) -> Arc<dyn ErasedCell> + Send + Sync>;

/// Type-erased declaration of a registered property.
pub struct PropertyMeta {
    pub(crate) id: PropertyId,
    pub(crate) name: Arc<str>,
    pub(crate) owner: &'static str,
    pub(crate) value_type: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) flags: PropertyFlags,
    pub(crate) default_json: serde_json::Value,
    pub(crate) make_cell: CellFactory,
}

impl PropertyMeta {
    /// Registry id.
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owner type name.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Rust type name of the value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declared capabilities.
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Default value as JSON.
    pub fn default_json(&self) -> &serde_json::Value {
        &self.default_json
    }

    pub(crate) fn is_type<T: 'static>(&self) -> bool {
        self.value_type == TypeId::of::<T>()
    }
}

impl fmt::Debug for PropertyMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMeta")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Typed handle to a registered property. Compared by id, never by name.
pub struct CoreProperty<T> {
    meta: Arc<PropertyMeta>,
    default: T,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PropertyValue> CoreProperty<T> {
    pub(crate) fn new(meta: Arc<PropertyMeta>, default: T) -> Self {
        Self {
            meta,
            default,
            _marker: PhantomData,
        }
    }

    /// Registry id.
    pub fn id(&self) -> PropertyId {
        self.meta.id
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Owner type name.
    pub fn owner(&self) -> &'static str {
        self.meta.owner
    }

    /// Declared capabilities.
    pub fn flags(&self) -> PropertyFlags {
        self.meta.flags
    }

    /// Whether a keyframe track may drive this property.
    pub fn is_animatable(&self) -> bool {
        self.meta.flags.animatable
    }

    /// Clone of the declared default.
    pub fn default_value(&self) -> T {
        self.default.clone()
    }

    /// Shared declaration record.
    pub fn meta(&self) -> &Arc<PropertyMeta> {
        &self.meta
    }
}

impl<T: Clone> Clone for CoreProperty<T> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            default: self.default.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for CoreProperty<T> {
    fn eq(&self, other: &Self) -> bool {
        self.meta.id == other.meta.id
    }
}

impl<T> Eq for CoreProperty<T> {}

impl<T> Hash for CoreProperty<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.meta.id.hash(state);
    }
}

impl<T> fmt::Debug for CoreProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoreProperty({}.{} #{})",
            self.meta.owner, self.meta.name, self.meta.id.0
        )
    }
}
