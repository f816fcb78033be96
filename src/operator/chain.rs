use std::{sync::Arc, time::Duration};

use crate::{
    engine::opts::EngineOpts,
    foundation::core::{FrameIndex, Fps},
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::OperatorId,
    operator::{
        base::Operator,
        context::{EvaluationContext, StateSlot},
    },
    property::{abstract_property::EditableProperty, store::sample_properties},
    scene::renderable::Renderable,
};

struct ChainElement {
    operator: Box<dyn Operator>,
    state: StateSlot,
    enabled: bool,
    initialized: bool,
}

impl ChainElement {
    fn release(&mut self) {
        if self.initialized {
            self.operator.uninitialize_for_context(&mut self.state);
            self.initialized = false;
        }
        self.state.clear();
    }
}

/// Sampled properties of one operator: `(name, value)` in display order.
pub type OperatorSample = (OperatorId, Vec<(String, serde_json::Value)>);

/// Ordered operators evaluated front to back over one working list of renderables.
///
/// The chain is a single evaluation context: each element keeps one [`StateSlot`] for its whole
/// membership. A failing operator is logged and skipped for that frame.
pub struct OperatorChain {
    elements: Vec<ChainElement>,
    opts: EngineOpts,
    pool: Option<rayon::ThreadPool>,
}

impl Default for OperatorChain {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            opts: EngineOpts::default(),
            pool: None,
        }
    }
}

impl OperatorChain {
    /// Empty chain. Builds a rayon pool when parallel sampling is enabled.
    pub fn new(opts: EngineOpts) -> OpflowResult<Self> {
        opts.validate()?;
        let pool = opts.build_thread_pool()?;
        Ok(Self {
            elements: Vec::new(),
            opts,
            pool,
        })
    }

    /// Options the chain was built with.
    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    /// Number of operators.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the chain holds no operators.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Operator ids in evaluation order.
    pub fn ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.elements.iter().map(|e| e.operator.id())
    }

    /// Operator with `id`.
    pub fn get(&self, id: OperatorId) -> Option<&dyn Operator> {
        self.position(id).map(|i| &*self.elements[i].operator)
    }

    /// Whether `id` is enabled, `None` if unknown.
    pub fn is_enabled(&self, id: OperatorId) -> Option<bool> {
        self.position(id).map(|i| self.elements[i].enabled)
    }

    fn position(&self, id: OperatorId) -> Option<usize> {
        self.elements.iter().position(|e| e.operator.id() == id)
    }

    /// Append an operator and return its id.
    pub fn push(&mut self, operator: impl Operator + 'static) -> OperatorId {
        self.push_boxed(Box::new(operator))
    }

    /// Append an already boxed operator.
    pub fn push_boxed(&mut self, operator: Box<dyn Operator>) -> OperatorId {
        let id = operator.id();
        self.elements.push(ChainElement {
            operator,
            state: StateSlot::new(),
            enabled: true,
            initialized: false,
        });
        id
    }

    /// Insert at `index`, shifting later operators back.
    pub fn insert(&mut self, index: usize, operator: Box<dyn Operator>) -> OpflowResult<OperatorId> {
        if index > self.elements.len() {
            return Err(OpflowError::validation(format!(
                "insert index {index} out of range for chain of {}",
                self.elements.len()
            )));
        }
        let id = operator.id();
        self.elements.insert(
            index,
            ChainElement {
                operator,
                state: StateSlot::new(),
                enabled: true,
                initialized: false,
            },
        );
        Ok(id)
    }

    /// Take an operator out of the chain, releasing its state and calling `exit`.
    pub fn remove(&mut self, id: OperatorId) -> Option<Box<dyn Operator>> {
        let index = self.position(id)?;
        let mut element = self.elements.remove(index);
        element.release();
        element.operator.exit();
        tracing::debug!(operator = element.operator.type_name(), id = id.0, "operator removed");
        Some(element.operator)
    }

    /// Disabling releases the operator's state, so every governed item is detached.
    pub fn set_enabled(&mut self, id: OperatorId, enabled: bool) -> OpflowResult<()> {
        let index = self
            .position(id)
            .ok_or_else(|| OpflowError::validation(format!("unknown operator #{}", id.0)))?;
        let element = &mut self.elements[index];
        if element.enabled && !enabled {
            element.release();
        }
        element.enabled = enabled;
        Ok(())
    }

    /// Evaluate from an empty list.
    pub fn evaluate(&mut self, time: Duration) -> Vec<Renderable> {
        self.evaluate_with(time, Vec::new())
    }

    /// Evaluate at the start time of `frame`.
    pub fn evaluate_frame(&mut self, frame: FrameIndex, fps: Fps) -> Vec<Renderable> {
        self.evaluate(fps.frame_to_time(frame))
    }

    /// Run every enabled operator over `renderables`, starting from the caller's list.
    #[tracing::instrument(skip(self, renderables), fields(operators = self.elements.len()))]
    pub fn evaluate_with(&mut self, time: Duration, mut renderables: Vec<Renderable>) -> Vec<Renderable> {
        for element in self.elements.iter_mut().filter(|e| e.enabled) {
            let op = &mut element.operator;
            if !element.initialized {
                if let Err(err) = op.initialize_for_context(&mut element.state) {
                    tracing::warn!(operator = op.type_name(), id = op.id().0, error = %err, "operator failed to initialize");
                    continue;
                }
                element.initialized = true;
            }

            let mut ctx = EvaluationContext::new(time, &mut renderables, &mut element.state);
            if let Err(err) = op.evaluate(&mut ctx) {
                tracing::warn!(operator = op.type_name(), id = op.id().0, error = %err, "operator failed, skipped for this frame");
            }
            renderables.retain(|item| !item.is_disposed());
        }
        renderables
    }

    /// Sample every operator's properties at `time`.
    ///
    /// Fans out over the rayon pool when parallel sampling is on and the chain holds at least
    /// `parallel_threshold` properties.
    pub fn inspect(&self, time: Duration) -> OpflowResult<Vec<OperatorSample>> {
        // Only the property lists cross into the pool; element state is not `Sync`.
        let targets: Vec<(OperatorId, &[Arc<dyn EditableProperty>])> = self
            .elements
            .iter()
            .map(|e| (e.operator.id(), e.operator.properties()))
            .collect();
        let total: usize = targets.iter().map(|(_, props)| props.len()).sum();
        let sample_all = |parallel: bool| -> OpflowResult<Vec<OperatorSample>> {
            targets
                .iter()
                .map(|&(id, props)| Ok((id, sample_properties(props, time, parallel)?)))
                .collect()
        };
        match &self.pool {
            Some(pool) if total >= self.opts.parallel_threshold => {
                tracing::trace!(total, "parallel inspect");
                pool.install(|| sample_all(true))
            }
            _ => sample_all(false),
        }
    }

    /// Release every operator's state and call `exit`. The chain is empty afterwards.
    pub fn exit(&mut self) {
        for mut element in self.elements.drain(..) {
            element.release();
            element.operator.exit();
        }
    }

    /// Serialize every operator with its enabled flag.
    pub fn write_json(&self) -> OpflowResult<serde_json::Value> {
        let operators = self
            .elements
            .iter()
            .map(|e| {
                Ok(serde_json::json!({
                    "enabled": e.enabled,
                    "operator": e.operator.write_json()?,
                }))
            })
            .collect::<OpflowResult<Vec<_>>>()?;
        Ok(serde_json::json!({ "operators": operators }))
    }
}

impl Drop for OperatorChain {
    fn drop(&mut self) {
        self.exit();
    }
}

impl std::fmt::Debug for OperatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorChain")
            .field(
                "operators",
                &self
                    .elements
                    .iter()
                    .map(|e| e.operator.type_name())
                    .collect::<Vec<_>>(),
            )
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/chain.rs"]
mod tests;
