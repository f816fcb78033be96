use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a registered property. Assigned in registration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PropertyId(pub u32);

/// Index of a node inside one [`crate::NodeGraph`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u32);

/// Process-unique operator identity, used as the owner key of renderable attachments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct OperatorId(pub u64);

/// Process-unique renderable identity. Two handles are the same item iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RenderableId(pub u64);

static NEXT_OPERATOR_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_RENDERABLE_ID: AtomicU64 = AtomicU64::new(1);

impl OperatorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl RenderableId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RENDERABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}
