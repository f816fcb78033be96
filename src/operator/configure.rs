use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
    time::Duration,
};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::{OperatorId, RenderableId},
    foundation::pool::{BufferPool, PoolOpts},
    operator::{
        base::{Operator, expect_type},
        context::{EvaluationContext, StateSlot},
    },
    property::{
        abstract_property::EditableProperty,
        store::{CoreObject, read_core_object, write_core_object},
    },
    scene::renderable::{Renderable, TargetKind},
};

static SNAPSHOT_POOL: OnceLock<Arc<BufferPool<Renderable>>> = OnceLock::new();

/// Process-wide pool that configure operators rent their snapshots from.
pub fn snapshot_pool() -> Arc<BufferPool<Renderable>> {
    SNAPSHOT_POOL
        .get_or_init(|| Arc::new(BufferPool::default()))
        .clone()
}

/// Configure the shared snapshot pool. Must run before the first operator is built.
pub fn install_snapshot_pool(opts: PoolOpts) -> OpflowResult<()> {
    SNAPSHOT_POOL
        .set(Arc::new(BufferPool::new(opts)))
        .map_err(|_| OpflowError::validation("snapshot pool already initialized"))?;
    tracing::info!(
        max_buffers_per_bucket = opts.max_buffers_per_bucket,
        max_retained_elements = opts.max_retained_elements,
        "snapshot pool installed"
    );
    Ok(())
}

/// The per-item behaviour of a [`ConfigureOperator`].
///
/// Every matching renderable gets exactly one `on_attached` when it enters the operator's
/// scope and exactly one `on_detached` when it leaves. Both are bracketed by
/// `pre_process`/`post_process`.
pub trait Configurator: Send + Sync + 'static {
    /// Editable payload applied to governed items.
    type Value: CoreObject + 'static;

    /// Operator type name.
    const TYPE_NAME: &'static str;

    /// Which renderables this configurator governs.
    fn target(&self) -> TargetKind;

    /// Item entered scope.
    fn on_attached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<Self::Value>);

    /// Item left scope, or the operator was torn down.
    fn on_detached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<Self::Value>);

    /// Runs before each attach or detach callback.
    fn pre_process(&mut self, _item: &Renderable, _value: &Arc<Self::Value>) {}

    /// Runs after each attach or detach callback.
    fn post_process(&mut self, _item: &Renderable, _value: &Arc<Self::Value>) {}

    /// Runs for every matching item each frame, after attach/detach.
    fn update(
        &mut self,
        _owner: OperatorId,
        _item: &Renderable,
        _value: &Arc<Self::Value>,
        _time: Duration,
    ) -> OpflowResult<()> {
        Ok(())
    }
}

/// Operator that diffs the frame's renderables against its previous snapshot.
pub struct ConfigureOperator<C: Configurator> {
    id: OperatorId,
    configurator: C,
    value: Arc<C::Value>,
    properties: Vec<Arc<dyn EditableProperty>>,
    pool: Arc<BufferPool<Renderable>>,
    snapshot: Option<Vec<Renderable>>,
    current: HashSet<RenderableId>,
    seen: HashSet<RenderableId>,
    removed: Vec<Renderable>,
}

impl<C: Configurator> ConfigureOperator<C> {
    /// Operator applying `value` through `configurator`. Rents from [`snapshot_pool`].
    pub fn new(configurator: C, value: C::Value) -> Self {
        let properties = value.store().editables();
        Self {
            id: OperatorId::next(),
            configurator,
            value: Arc::new(value),
            properties,
            pool: snapshot_pool(),
            snapshot: None,
            current: HashSet::new(),
            seen: HashSet::new(),
            removed: Vec::new(),
        }
    }

    /// Use a private pool instead of the shared one.
    pub fn with_pool(mut self, pool: Arc<BufferPool<Renderable>>) -> Self {
        self.pool = pool;
        self
    }

    /// The configurator.
    pub fn configurator(&self) -> &C {
        &self.configurator
    }

    /// Shared payload handed to every callback.
    pub fn value(&self) -> &Arc<C::Value> {
        &self.value
    }

    /// Items recorded by the last evaluation, matching or not.
    pub fn snapshot(&self) -> &[Renderable] {
        self.snapshot.as_deref().unwrap_or(&[])
    }

    fn notify(&mut self, item: &Renderable, attached: bool) {
        let cfg = &mut self.configurator;
        cfg.pre_process(item, &self.value);
        if attached {
            cfg.on_attached(self.id, item, &self.value);
        } else {
            cfg.on_detached(self.id, item, &self.value);
        }
        cfg.post_process(item, &self.value);
    }

    fn diff(&mut self, current: &[Renderable]) -> (usize, usize) {
        let target = self.configurator.target();

        self.current.clear();
        self.current
            .extend(current.iter().filter(|r| target.matches(r)).map(Renderable::id));

        self.seen.clear();
        self.removed.clear();
        if let Some(prev) = &self.snapshot {
            for item in prev.iter().filter(|r| target.matches(r)) {
                if self.seen.insert(item.id()) && !self.current.contains(&item.id()) {
                    self.removed.push(item.clone());
                }
            }
        }

        let mut attached = 0;
        for item in current.iter().filter(|r| target.matches(r)) {
            if self.seen.insert(item.id()) {
                self.notify(item, true);
                attached += 1;
            }
        }

        let removed = std::mem::take(&mut self.removed);
        for item in &removed {
            self.notify(item, false);
        }
        let detached = removed.len();
        self.removed = removed;
        self.removed.clear();

        (attached, detached)
    }

    fn record_snapshot(&mut self, current: &[Renderable]) {
        let prev_capacity = self.snapshot.as_ref().map_or(0, Vec::capacity);
        if let Some(old) = self.snapshot.take() {
            self.pool.give_back(old);
        }
        let mut next = self.pool.rent(prev_capacity.max(current.len()));
        next.extend_from_slice(current);
        self.snapshot = Some(next);
    }

    /// Detach everything still governed and hand the snapshot back to the pool.
    fn teardown(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let target = self.configurator.target();
        self.seen.clear();
        let mut detached = 0;
        for item in snapshot.iter().filter(|r| target.matches(r)) {
            if self.seen.insert(item.id()) {
                self.notify(item, false);
                detached += 1;
            }
        }
        self.pool.give_back(snapshot);
        tracing::debug!(
            operator = C::TYPE_NAME,
            id = self.id.0,
            detached,
            "configure operator released"
        );
    }
}

impl<C: Configurator> Operator for ConfigureOperator<C> {
    fn type_name(&self) -> &'static str {
        C::TYPE_NAME
    }

    fn id(&self) -> OperatorId {
        self.id
    }

    fn properties(&self) -> &[Arc<dyn EditableProperty>] {
        &self.properties
    }

    #[tracing::instrument(skip(self, ctx), fields(operator = C::TYPE_NAME, id = self.id.0))]
    fn evaluate(&mut self, ctx: &mut EvaluationContext<'_>) -> OpflowResult<()> {
        let (attached, detached) = self.diff(ctx.renderables.as_slice());
        self.record_snapshot(ctx.renderables.as_slice());
        if attached + detached > 0 {
            tracing::trace!(attached, detached, "scope changed");
        }

        let target = self.configurator.target();
        for item in ctx.renderables.iter().filter(|r| target.matches(r)) {
            self.configurator
                .update(self.id, item, &self.value, ctx.time)?;
        }
        Ok(())
    }

    fn uninitialize_for_context(&mut self, _state: &mut StateSlot) {
        self.teardown();
    }

    fn exit(&mut self) {
        self.teardown();
    }

    fn write_json(&self) -> OpflowResult<serde_json::Value> {
        Ok(serde_json::json!({
            "type": C::TYPE_NAME,
            "value": write_core_object(self.value.as_ref())?,
        }))
    }

    fn read_json(&mut self, json: &serde_json::Value) -> OpflowResult<()> {
        expect_type(json, C::TYPE_NAME)?;
        let value = json
            .get("value")
            .ok_or_else(|| OpflowError::serde("operator json is missing 'value'"))?;
        read_core_object(self.value.as_ref(), value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/configure.rs"]
mod tests;
