use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc, Mutex, MutexGuard, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::{OperatorId, RenderableId},
};

/// Payload shape of a renderable.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderableKind {
    /// Raster layer.
    Bitmap {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Interleaved audio buffer.
    Audio {
        /// Samples per second per channel.
        sample_rate: u32,
        /// Channel count.
        channels: u16,
        /// Interleaved samples.
        samples: Arc<Vec<f32>>,
    },
    /// Paint source applied by other items.
    Brush,
}

impl RenderableKind {
    /// Target kind this payload belongs to.
    pub fn target(&self) -> TargetKind {
        match self {
            Self::Bitmap { .. } => TargetKind::Bitmap,
            Self::Audio { .. } => TargetKind::Audio,
            Self::Brush => TargetKind::Brush,
        }
    }
}

/// Which renderables an operator governs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TargetKind {
    /// Every item.
    Any,
    /// [`RenderableKind::Bitmap`] items.
    Bitmap,
    /// [`RenderableKind::Audio`] items.
    Audio,
    /// [`RenderableKind::Brush`] items.
    Brush,
}

impl TargetKind {
    /// Whether `item` is selected.
    pub fn matches(self, item: &Renderable) -> bool {
        self == Self::Any || item.target_kind() == self
    }
}

type AttachmentKey = (OperatorId, &'static str);

struct RenderableInner {
    id: RenderableId,
    kind: RwLock<RenderableKind>,
    disposed: AtomicBool,
    hints: RwLock<BTreeMap<String, serde_json::Value>>,
    attachments: Mutex<HashMap<AttachmentKey, Arc<dyn Any + Send + Sync>>>,
}

/// Shared handle to an item in the frame's working list.
///
/// Clones refer to the same item. Equality and hashing use [`RenderableId`] only.
#[derive(Clone)]
pub struct Renderable {
    inner: Arc<RenderableInner>,
}

impl Renderable {
    /// New item with a fresh id.
    pub fn new(kind: RenderableKind) -> Self {
        Self {
            inner: Arc::new(RenderableInner {
                id: RenderableId::next(),
                kind: RwLock::new(kind),
                disposed: AtomicBool::new(false),
                hints: RwLock::new(BTreeMap::new()),
                attachments: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// New bitmap item.
    pub fn bitmap(width: u32, height: u32) -> Self {
        Self::new(RenderableKind::Bitmap { width, height })
    }

    /// New audio item over interleaved `samples`.
    pub fn audio(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self::new(RenderableKind::Audio {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        })
    }

    /// New brush item.
    pub fn brush() -> Self {
        Self::new(RenderableKind::Brush)
    }

    /// Process-unique identity.
    pub fn id(&self) -> RenderableId {
        self.inner.id
    }

    /// Copy of the current payload. Audio samples are shared, not copied.
    pub fn kind(&self) -> RenderableKind {
        self.inner
            .kind
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Target kind of the current payload.
    pub fn target_kind(&self) -> TargetKind {
        self.inner
            .kind
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .target()
    }

    /// Replace the payload. The target kind must stay the same.
    pub fn set_kind(&self, kind: RenderableKind) -> OpflowResult<()> {
        let mut slot = self.inner.kind.write().unwrap_or_else(|e| e.into_inner());
        if slot.target() != kind.target() {
            return Err(OpflowError::validation(format!(
                "renderable {:?} cannot change from {:?} to {:?}",
                self.inner.id,
                slot.target(),
                kind.target()
            )));
        }
        *slot = kind;
        Ok(())
    }

    /// Whether [`Renderable::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Mark the item as gone and drop every attachment. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = {
            let mut attachments = self.attachments();
            let n = attachments.len();
            attachments.clear();
            n
        };
        tracing::debug!(id = self.inner.id.0, dropped, "renderable disposed");
    }

    /// Set an option-bag hint read by downstream consumers.
    pub fn set_hint(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner
            .hints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value);
    }

    /// Copy of the hint under `key`.
    pub fn hint(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .hints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Remove and return the hint under `key`.
    pub fn remove_hint(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .hints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    /// Store `payload` under `(owner, slot)`, replacing any previous one. Returns `true` on replace.
    pub fn attach<T: Any + Send + Sync>(
        &self,
        owner: OperatorId,
        slot: &'static str,
        payload: Arc<T>,
    ) -> bool {
        self.attachments().insert((owner, slot), payload).is_some()
    }

    /// Remove the payload under `(owner, slot)`. Returns `true` if one was present.
    pub fn detach(&self, owner: OperatorId, slot: &'static str) -> bool {
        self.attachments().remove(&(owner, slot)).is_some()
    }

    /// Payload attached by `owner` under `slot`, if it has type `T`.
    pub fn attachment<T: Any + Send + Sync>(
        &self,
        owner: OperatorId,
        slot: &'static str,
    ) -> Option<Arc<T>> {
        let entry = self.attachments().get(&(owner, slot))?.clone();
        entry.downcast::<T>().ok()
    }

    /// Whether `owner` holds an attachment under `slot`.
    pub fn has_attachment(&self, owner: OperatorId, slot: &'static str) -> bool {
        self.attachments().contains_key(&(owner, slot))
    }

    /// Number of attachments across all owners.
    pub fn attachment_count(&self) -> usize {
        self.attachments().len()
    }

    fn attachments(&self) -> MutexGuard<'_, HashMap<AttachmentKey, Arc<dyn Any + Send + Sync>>> {
        self.inner
            .attachments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl PartialEq for Renderable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Renderable {}

impl Hash for Renderable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderable")
            .field("id", &self.inner.id.0)
            .field("kind", &self.target_kind())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/renderable.rs"]
mod tests;
