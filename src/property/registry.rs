use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use crate::{
    animation::keyframe::Lerp,
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::PropertyId,
    property::{
        cell::{ErasedCell, Observers, PropertyCell, Sampler},
        core_property::{CoreProperty, PropertyFlags, PropertyMeta, PropertyValue},
    },
};

/// A type that declares a family of properties, e.g. the payload of a configurator.
///
/// `declare` runs exactly once per registry and returns the typed handles, which the
/// registry keeps and hands out through [`PropertyRegistry::owner`].
pub trait PropertyOwner: Send + Sync + Sized + 'static {
    /// Owner name recorded on every property it declares.
    const OWNER: &'static str;

    /// Register this owner's properties and return the handles.
    fn declare(owner: &mut OwnerBuilder<'_>) -> Self;
}

/// Collects property declarations before the registry is frozen.
#[derive(Default)]
pub struct PropertyRegistryBuilder {
    metas: Vec<Arc<PropertyMeta>>,
    owners: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    owner_names: HashSet<&'static str>,
    seen: HashSet<(&'static str, String)>,
    problems: Vec<String>,
}

impl PropertyRegistryBuilder {
    /// Register `O`. Registering the same owner twice is a no-op.
    pub fn register<O: PropertyOwner>(&mut self) -> &mut Self {
        let key = TypeId::of::<O>();
        if self.owners.contains_key(&key) {
            return self;
        }
        if !self.owner_names.insert(O::OWNER) {
            self.problems
                .push(format!("owner name '{}' registered by two types", O::OWNER));
        }

        let mut owner = OwnerBuilder {
            registry: &mut *self,
            owner: O::OWNER,
        };
        let handles = O::declare(&mut owner);
        self.owners.insert(key, Arc::new(handles));
        self
    }

    /// Freeze the declarations. Fails if any name was invalid or declared twice.
    /// Consumes the builder, so ids are never handed out twice.
    pub fn build(self) -> OpflowResult<PropertyRegistry> {
        if !self.problems.is_empty() {
            return Err(OpflowError::validation(self.problems.join("; ")));
        }

        let metas = self.metas;
        let mut by_owner: HashMap<&'static str, Vec<Arc<PropertyMeta>>> = HashMap::new();
        for meta in &metas {
            by_owner.entry(meta.owner).or_default().push(meta.clone());
        }
        tracing::debug!(
            properties = metas.len(),
            owners = by_owner.len(),
            "property registry built"
        );

        Ok(PropertyRegistry {
            metas,
            by_owner,
            owners: self.owners,
        })
    }

    fn declare<T: PropertyValue>(
        &mut self,
        owner: &'static str,
        name: String,
        default: T,
        flags: PropertyFlags,
        sampler: Option<Sampler<T>>,
    ) -> CoreProperty<T> {
        if name.is_empty() {
            self.problems
                .push(format!("property on '{owner}' has an empty name"));
        } else if name.contains('.') {
            self.problems
                .push(format!("property name '{owner}.{name}' must not contain '.'"));
        }
        if !self.seen.insert((owner, name.clone())) {
            self.problems
                .push(format!("property '{owner}.{name}' declared twice"));
        }

        let default_json = match serde_json::to_value(&default) {
            Ok(v) => v,
            Err(e) => {
                self.problems
                    .push(format!("default of '{owner}.{name}' is not serializable: {e}"));
                serde_json::Value::Null
            }
        };

        let id = PropertyId(self.metas.len() as u32);
        let name: Arc<str> = Arc::from(name);
        let cell_name = name.clone();
        let cell_default = default.clone();
        let meta = Arc::new(PropertyMeta {
            id,
            name,
            owner,
            value_type: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            flags,
            default_json,
            make_cell: Arc::new(move |feed: &Arc<Observers<PropertyId>>| {
                Arc::new(PropertyCell::new(
                    id,
                    cell_name.clone(),
                    flags.notifies,
                    cell_default.clone(),
                    sampler,
                    feed.clone(),
                )) as Arc<dyn ErasedCell>
            }),
        });
        self.metas.push(meta.clone());
        CoreProperty::new(meta, default)
    }
}

/// Scoped handle passed to [`PropertyOwner::declare`].
pub struct OwnerBuilder<'a> {
    registry: &'a mut PropertyRegistryBuilder,
    owner: &'static str,
}

impl OwnerBuilder<'_> {
    /// Owner name properties are declared under.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Start declaring a property named `name` with the given default value.
    pub fn property<T: PropertyValue>(
        &mut self,
        name: impl Into<String>,
        default: T,
    ) -> PropertyBuilder<'_, T> {
        PropertyBuilder {
            registry: &mut *self.registry,
            owner: self.owner,
            name: name.into(),
            default,
            flags: PropertyFlags::default(),
            sampler: None,
        }
    }
}

/// Declaration of one property. Call [`PropertyBuilder::finish`] to register it.
pub struct PropertyBuilder<'a, T> {
    registry: &'a mut PropertyRegistryBuilder,
    owner: &'static str,
    name: String,
    default: T,
    flags: PropertyFlags,
    sampler: Option<Sampler<T>>,
}

impl<T: PropertyValue> PropertyBuilder<'_, T> {
    /// Publish changes on the owning store's change feed.
    pub fn notifies(mut self) -> Self {
        self.flags.notifies = true;
        self
    }

    /// Register the property and return its typed handle.
    pub fn finish(self) -> CoreProperty<T> {
        self.registry
            .declare(self.owner, self.name, self.default, self.flags, self.sampler)
    }
}

impl<T: PropertyValue + Lerp> PropertyBuilder<'_, T> {
    /// Allow a keyframe track to drive this property.
    pub fn animatable(mut self) -> Self {
        let sample: Sampler<T> = |anim, time| anim.sample(time);
        self.flags.animatable = true;
        self.sampler = Some(sample);
        self
    }
}

/// Frozen set of property declarations.
pub struct PropertyRegistry {
    metas: Vec<Arc<PropertyMeta>>,
    by_owner: HashMap<&'static str, Vec<Arc<PropertyMeta>>>,
    owners: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

static GLOBAL: OnceLock<PropertyRegistry> = OnceLock::new();

impl PropertyRegistry {
    /// Empty builder.
    pub fn builder() -> PropertyRegistryBuilder {
        PropertyRegistryBuilder::default()
    }

    /// Typed handles declared by `O`.
    pub fn owner<O: PropertyOwner>(&self) -> OpflowResult<Arc<O>> {
        let entry = self.owners.get(&TypeId::of::<O>()).ok_or_else(|| {
            OpflowError::validation(format!("property owner '{}' is not registered", O::OWNER))
        })?;
        entry.clone().downcast::<O>().map_err(|_| {
            OpflowError::validation(format!("property owner '{}' has a foreign entry", O::OWNER))
        })
    }

    /// Whether `O` was declared on this registry.
    pub fn is_registered<O: PropertyOwner>(&self) -> bool {
        self.owners.contains_key(&TypeId::of::<O>())
    }

    /// Declaration for `id`.
    pub fn meta(&self, id: PropertyId) -> Option<&Arc<PropertyMeta>> {
        self.metas.get(id.0 as usize)
    }

    /// Declaration of `owner.name`.
    pub fn find(&self, owner: &str, name: &str) -> Option<&Arc<PropertyMeta>> {
        self.properties_of(owner).iter().find(|m| m.name() == name)
    }

    /// Properties of `owner` in declaration order.
    pub fn properties_of(&self, owner: &str) -> &[Arc<PropertyMeta>] {
        self.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of declared properties.
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// Whether no property was declared.
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Make this registry the process-wide one. Only the first install wins.
    pub fn install(self) -> OpflowResult<&'static PropertyRegistry> {
        GLOBAL
            .set(self)
            .map_err(|_| OpflowError::validation("a global property registry is already installed"))?;
        tracing::info!("global property registry installed");
        Self::global()
    }

    /// The installed process-wide registry.
    pub fn global() -> OpflowResult<&'static PropertyRegistry> {
        GLOBAL
            .get()
            .ok_or_else(|| OpflowError::validation("no global property registry installed"))
    }
}

impl std::fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("properties", &self.metas)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/property/registry.rs"]
mod tests;
