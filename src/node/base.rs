use std::{sync::Arc, time::Duration};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    node::socket::{InputSocket, OutputSocket, SocketSet, SocketType, SocketValue},
    operator::context::StateSlot,
    property::abstract_property::EditableProperty,
    scene::renderable::Renderable,
};

/// A dataflow unit with a fixed socket layout.
///
/// Nodes are shared configuration. Anything a node remembers between frames lives in the
/// [`StateSlot`] handed to it, never in its own fields, so one node can serve many contexts.
pub trait Node: Send + Sync {
    /// Stable name used in logs and graph JSON.
    fn type_name(&self) -> &'static str;

    /// Socket layout. Must not change over the node's lifetime.
    fn sockets(&self) -> &SocketSet;

    /// Editable properties the node exposes to its owning operator.
    fn properties(&self) -> Vec<Arc<dyn EditableProperty>> {
        Vec::new()
    }

    /// Prepare `state` before the first evaluation in a context.
    fn initialize_for_context(&self, _state: &mut StateSlot) -> OpflowResult<()> {
        Ok(())
    }

    /// Read inputs, write outputs. Runs once per frame in topological order.
    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()>;

    /// Release whatever `initialize_for_context` or `evaluate` left in `state`.
    fn uninitialize_for_context(&self, state: &mut StateSlot) {
        state.clear();
    }
}

/// What a node sees during one evaluation.
pub struct NodeContext<'a> {
    /// Evaluation time.
    pub time: Duration,
    /// True when the playhead jumped since the previous evaluation of this instance.
    pub seeked: bool,
    /// Per-context storage of this node.
    pub state: &'a mut StateSlot,
    /// Working list of the owning chain. Output nodes append to it.
    pub renderables: &'a mut Vec<Renderable>,
    node: &'static str,
    inputs: &'a [Box<dyn SocketValue>],
    outputs: &'a mut [Option<Box<dyn SocketValue>>],
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: &'static str,
        time: Duration,
        seeked: bool,
        state: &'a mut StateSlot,
        renderables: &'a mut Vec<Renderable>,
        inputs: &'a [Box<dyn SocketValue>],
        outputs: &'a mut [Option<Box<dyn SocketValue>>],
    ) -> Self {
        Self {
            time,
            seeked,
            state,
            renderables,
            node,
            inputs,
            outputs,
        }
    }

    /// Resolved value of `socket`: the upstream value when wired, otherwise the default.
    pub fn input<T: SocketType>(&self, socket: InputSocket<T>) -> OpflowResult<T> {
        let value: &dyn SocketValue = self
            .inputs
            .get(socket.index())
            .map(|v| &**v)
            .ok_or_else(|| {
                OpflowError::graph(format!("{}: no input '{}'", self.node, socket.name()))
            })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| OpflowError::TypeMismatch {
                property: format!("{}.{}", self.node, socket.name()),
                expected: std::any::type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// Publish `value` on `socket` for downstream nodes.
    pub fn set_output<T: SocketType>(&mut self, socket: OutputSocket<T>, value: T) {
        if let Some(slot) = self.outputs.get_mut(socket.index()) {
            *slot = Some(Box::new(value));
        }
    }

    /// Publish nothing on `socket`. Downstream inputs fall back to their defaults.
    pub fn clear_output<T>(&mut self, socket: OutputSocket<T>) {
        if let Some(slot) = self.outputs.get_mut(socket.index()) {
            *slot = None;
        }
    }
}
