use std::{sync::Arc, time::Duration};

use crate::{
    engine::opts::EngineOpts,
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::OperatorId,
    node::graph::{Connection, GraphInstance, NodeGraph},
    operator::{
        base::{Operator, expect_type},
        context::{EvaluationContext, StateSlot},
    },
    property::abstract_property::EditableProperty,
};

/// Runs a [`NodeGraph`] as one chain element. The graph instance lives in the context state.
pub struct GraphOperator {
    id: OperatorId,
    graph: NodeGraph,
    seek_tolerance: Duration,
    properties: Vec<Arc<dyn EditableProperty>>,
}

impl GraphOperator {
    /// Operator type name.
    pub const TYPE_NAME: &'static str = "Graph";

    /// Operator over `graph` with default engine options.
    pub fn new(graph: NodeGraph) -> Self {
        Self::with_opts(graph, &EngineOpts::default())
    }

    /// Operator over `graph` using the seek tolerance from `opts`.
    pub fn with_opts(graph: NodeGraph, opts: &EngineOpts) -> Self {
        let mut op = Self {
            id: OperatorId::next(),
            graph,
            seek_tolerance: Duration::from_secs_f64(opts.seek_tolerance_ms.max(0.0) / 1000.0),
            properties: Vec::new(),
        };
        op.refresh_properties();
        op
    }

    /// The graph being evaluated.
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Mutate the graph. Live instances pick the change up on their next evaluation.
    pub fn edit_graph<R>(&mut self, edit: impl FnOnce(&mut NodeGraph) -> R) -> R {
        let out = edit(&mut self.graph);
        self.refresh_properties();
        out
    }

    fn refresh_properties(&mut self) {
        self.properties = self
            .graph
            .node_ids()
            .filter_map(|id| self.graph.node(id))
            .flat_map(|node| node.properties())
            .collect();
    }
}

impl Operator for GraphOperator {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn id(&self) -> OperatorId {
        self.id
    }

    fn properties(&self) -> &[Arc<dyn EditableProperty>] {
        &self.properties
    }

    fn initialize_for_context(&mut self, state: &mut StateSlot) -> OpflowResult<()> {
        if !state.holds::<GraphInstance>() {
            state.insert(self.graph.instantiate(self.seek_tolerance));
        }
        Ok(())
    }

    fn evaluate(&mut self, ctx: &mut EvaluationContext<'_>) -> OpflowResult<()> {
        let instance = ctx
            .state
            .get_or_insert_with(|| self.graph.instantiate(self.seek_tolerance))?;
        instance.evaluate(&self.graph, ctx.time, ctx.renderables)
    }

    fn uninitialize_for_context(&mut self, state: &mut StateSlot) {
        if let Some(mut instance) = state.take::<GraphInstance>() {
            instance.release(&self.graph);
        }
        state.clear();
    }

    fn write_json(&self) -> OpflowResult<serde_json::Value> {
        let nodes: Vec<serde_json::Value> = self
            .graph
            .node_ids()
            .filter_map(|id| {
                let node = self.graph.node(id)?;
                Some(serde_json::json!({ "id": id, "type": node.type_name() }))
            })
            .collect();
        Ok(serde_json::json!({
            "type": Self::TYPE_NAME,
            "nodes": nodes,
            "connections": self.graph.connections(),
        }))
    }

    /// Restore wiring. Nodes are built in code, so only connections are read back.
    fn read_json(&mut self, json: &serde_json::Value) -> OpflowResult<()> {
        expect_type(json, Self::TYPE_NAME)?;
        let wires: Vec<Connection> = match json.get("connections") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        };
        for wire in &wires {
            if !self.graph.contains(wire.source) || !self.graph.contains(wire.target) {
                return Err(OpflowError::serde(format!(
                    "connection refers to missing node #{} or #{}",
                    wire.source.0, wire.target.0
                )));
            }
        }
        self.edit_graph(|graph| graph.replace_connections(&wires))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/graph_op.rs"]
mod tests;
