use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::NodeId,
    node::{
        base::{Node, NodeContext},
        socket::{InputDecl, SocketSet, SocketType, SocketValue},
    },
    operator::context::StateSlot,
    scene::renderable::Renderable,
};

/// How a link's upstream value reaches its input, decided when the link is made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    /// Same value type on both ends.
    Direct,
    /// The input registered a receiver for the upstream type.
    Converted,
    /// No conversion exists; the input keeps reading its default.
    Incompatible,
}

/// One wire, addressed by socket names as an editor would persist it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Connection {
    /// Upstream node.
    pub source: NodeId,
    /// Output socket name on `source`.
    pub output: String,
    /// Downstream node.
    pub target: NodeId,
    /// Input socket name on `target`.
    pub input: String,
}

#[derive(Clone, Copy, Debug)]
enum Route {
    Direct,
    Converted(usize),
    Incompatible,
}

#[derive(Clone, Copy, Debug)]
struct Link {
    source: NodeId,
    output: usize,
    route: Route,
}

struct NodeEntry {
    node: Arc<dyn Node>,
    defaults: Vec<Box<dyn SocketValue>>,
}

/// Editable acyclic graph of nodes. Holds no per-context state; see [`GraphInstance`].
#[derive(Default)]
pub struct NodeGraph {
    nodes: Vec<Option<NodeEntry>>,
    // Keyed by (target, input index): one link per input.
    links: BTreeMap<(NodeId, usize), Link>,
}

impl NodeGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` and return its id. Ids are never reused.
    pub fn add_node(&mut self, node: impl Node + 'static) -> NodeId {
        self.add_shared(Arc::new(node))
    }

    /// Add a node already shared elsewhere. Ids are never reused within one graph.
    pub fn add_shared(&mut self, node: Arc<dyn Node>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let defaults = node
            .sockets()
            .inputs
            .iter()
            .map(|i| (*i.default).clone_value())
            .collect();
        self.nodes.push(Some(NodeEntry { node, defaults }));
        id
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Arc<dyn Node>> {
        let entry = self.nodes.get_mut(id.0 as usize)?.take()?;
        self.links
            .retain(|&(target, _), link| target != id && link.source != id);
        Some(entry.node)
    }

    /// Node behind `id`, if still present.
    pub fn node(&self, id: NodeId) -> Option<&Arc<dyn Node>> {
        self.entry(id).map(|e| &e.node)
    }

    /// Whether `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Live node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.node_ids().count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn entry_or_err(&self, id: NodeId) -> OpflowResult<&NodeEntry> {
        self.entry(id)
            .ok_or_else(|| OpflowError::graph(format!("unknown node #{}", id.0)))
    }

    /// Wire `source.output` into `target.input`, replacing any link already on that input.
    ///
    /// Unknown nodes or sockets and links that would close a cycle are errors. A type mismatch
    /// without a receiver is not: the link is kept as [`Compatibility::Incompatible`] and the
    /// input keeps reading its default.
    pub fn connect(
        &mut self,
        source: NodeId,
        output: &str,
        target: NodeId,
        input: &str,
    ) -> OpflowResult<Compatibility> {
        let src = self.entry_or_err(source)?;
        let dst = self.entry_or_err(target)?;
        let out_index = socket_index(src.node.sockets(), output, false, src.node.type_name())?;
        let in_index = socket_index(dst.node.sockets(), input, true, dst.node.type_name())?;

        if source == target || self.reaches(target, source) {
            return Err(OpflowError::graph(format!(
                "linking #{}.{output} -> #{}.{input} would create a cycle",
                source.0, target.0
            )));
        }

        let out_decl = src.node.sockets().output(out_index)?;
        let in_decl = dst.node.sockets().input(in_index)?;
        let route = route_for(out_decl.value_type, in_decl);
        let compat = match route {
            Route::Direct => Compatibility::Direct,
            Route::Converted(_) => Compatibility::Converted,
            Route::Incompatible => {
                tracing::warn!(
                    source = source.0,
                    output,
                    target = target.0,
                    input,
                    from = out_decl.type_name,
                    to = in_decl.type_name,
                    "incompatible link, input keeps its default"
                );
                Compatibility::Incompatible
            }
        };

        self.links.insert(
            (target, in_index),
            Link {
                source,
                output: out_index,
                route,
            },
        );
        Ok(compat)
    }

    /// Swap the whole wiring for `wires`. All or nothing: on error the previous links stay.
    pub fn replace_connections(&mut self, wires: &[Connection]) -> OpflowResult<()> {
        let previous = std::mem::take(&mut self.links);
        for wire in wires {
            if let Err(err) = self.connect(wire.source, &wire.output, wire.target, &wire.input) {
                self.links = previous;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove the link feeding `target.input`. Returns whether one existed.
    pub fn disconnect(&mut self, target: NodeId, input: &str) -> bool {
        let Some(entry) = self.entry(target) else {
            return false;
        };
        let Some(index) = entry.node.sockets().input_index(input) else {
            return false;
        };
        self.links.remove(&(target, index)).is_some()
    }

    /// Replace the value an input reads while unconnected.
    pub fn set_input_default<T: SocketType>(
        &mut self,
        node: NodeId,
        input: &str,
        value: T,
    ) -> OpflowResult<()> {
        let entry = self
            .nodes
            .get_mut(node.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| OpflowError::graph(format!("unknown node #{}", node.0)))?;
        let sockets = entry.node.sockets();
        let index = socket_index(sockets, input, true, entry.node.type_name())?;
        let decl = sockets.input(index)?;
        if decl.value_type != std::any::TypeId::of::<T>() {
            return Err(OpflowError::TypeMismatch {
                property: format!("{}.{input}", entry.node.type_name()),
                expected: decl.type_name,
                found: std::any::type_name::<T>(),
            });
        }
        entry.defaults[index] = Box::new(value);
        Ok(())
    }

    /// How the link on `target.input` resolves, if the input is wired.
    pub fn compatibility(&self, target: NodeId, input: &str) -> Option<Compatibility> {
        let index = self.entry(target)?.node.sockets().input_index(input)?;
        self.links.get(&(target, index)).map(|l| match l.route {
            Route::Direct => Compatibility::Direct,
            Route::Converted(_) => Compatibility::Converted,
            Route::Incompatible => Compatibility::Incompatible,
        })
    }

    /// Current wiring, ordered by target then input.
    pub fn connections(&self) -> Vec<Connection> {
        self.links
            .iter()
            .filter_map(|(&(target, input), link)| {
                let src = self.entry(link.source)?.node.sockets();
                let dst = self.entry(target)?.node.sockets();
                Some(Connection {
                    source: link.source,
                    output: src.outputs.get(link.output)?.name.to_owned(),
                    target,
                    input: dst.inputs.get(input)?.name.to_owned(),
                })
            })
            .collect()
    }

    /// Evaluation order: every node after all of its upstream nodes, ties by id.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut indegree: HashMap<NodeId, usize> = self.node_ids().map(|id| (id, 0)).collect();
        let mut downstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (&(target, _), link) in &self.links {
            if let Some(d) = indegree.get_mut(&target) {
                *d += 1;
            }
            downstream.entry(link.source).or_default().push(target);
        }

        let mut ready: BTreeSet<NodeId> = indegree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(indegree.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for next in downstream.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(*next);
                    }
                }
            }
        }
        order
    }

    /// Fresh per-context instance. Seeks are forward jumps above `seek_tolerance` or any
    /// backward jump.
    pub fn instantiate(&self, seek_tolerance: Duration) -> GraphInstance {
        GraphInstance {
            slots: HashMap::new(),
            last_time: None,
            seek_tolerance,
        }
    }

    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.extend(
                self.links
                    .iter()
                    .filter(|(_, link)| link.source == id)
                    .map(|(&(target, _), _)| target),
            );
        }
        false
    }
}

impl std::fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.len())
            .field("links", &self.links.len())
            .finish()
    }
}

fn socket_index(sockets: &SocketSet, name: &str, input: bool, node: &str) -> OpflowResult<usize> {
    let found = if input {
        sockets.input_index(name)
    } else {
        sockets.output_index(name)
    };
    found.ok_or_else(|| {
        let dir = if input { "input" } else { "output" };
        OpflowError::graph(format!("{node} has no {dir} '{name}'"))
    })
}

fn route_for(from: std::any::TypeId, input: &InputDecl) -> Route {
    if from == input.value_type {
        return Route::Direct;
    }
    input
        .receivers
        .iter()
        .position(|r| r.source == from)
        .map_or(Route::Incompatible, Route::Converted)
}

struct NodeSlot {
    state: StateSlot,
    outputs: Vec<Option<Box<dyn SocketValue>>>,
    initialized: bool,
}

/// Per-context evaluation state of a [`NodeGraph`]: node states, last outputs and the
/// previous evaluation time.
pub struct GraphInstance {
    slots: HashMap<NodeId, NodeSlot>,
    last_time: Option<Duration>,
    seek_tolerance: Duration,
}

impl GraphInstance {
    /// Time of the previous evaluation, `None` before the first or after a release.
    pub fn last_time(&self) -> Option<Duration> {
        self.last_time
    }

    /// Number of nodes currently holding state in this instance.
    pub fn live_nodes(&self) -> usize {
        self.slots.values().filter(|s| s.initialized).count()
    }

    /// Last value written to `node.output`, if any.
    pub fn output<T: SocketType>(&self, graph: &NodeGraph, node: NodeId, output: &str) -> Option<T> {
        let index = graph.entry(node)?.node.sockets().output_index(output)?;
        let value = self.slots.get(&node)?.outputs.get(index)?.as_deref()?;
        value.downcast_ref::<T>().cloned()
    }

    /// Evaluate every node once, in dependency order.
    ///
    /// A node that fails to initialize or evaluate is logged and its outputs fall back to their
    /// initial values, so downstream inputs read their defaults. Only an unevaluable graph
    /// errors.
    #[tracing::instrument(skip(self, graph, renderables), fields(nodes = graph.len()))]
    pub fn evaluate(
        &mut self,
        graph: &NodeGraph,
        time: Duration,
        renderables: &mut Vec<Renderable>,
    ) -> OpflowResult<()> {
        let seeked = self
            .last_time
            .is_some_and(|last| time < last || time - last > self.seek_tolerance);
        self.last_time = Some(time);
        if seeked {
            tracing::debug!(?time, "seek");
        }

        self.slots.retain(|id, _| graph.contains(*id));

        for id in graph.topological_order() {
            let entry = graph.entry_or_err(id)?;
            let node = &entry.node;
            let inputs = resolve_inputs(graph, &self.slots, id, entry);

            let slot = self.slots.entry(id).or_insert_with(|| NodeSlot {
                state: StateSlot::new(),
                outputs: node.sockets().initial_outputs(),
                initialized: false,
            });
            if !slot.initialized {
                if let Err(err) = node.initialize_for_context(&mut slot.state) {
                    tracing::warn!(node = node.type_name(), id = id.0, error = %err, "node failed to initialize");
                    slot.outputs = node.sockets().initial_outputs();
                    continue;
                }
                slot.initialized = true;
            }

            let mut ctx = NodeContext::new(
                node.type_name(),
                time,
                seeked,
                &mut slot.state,
                &mut *renderables,
                &inputs,
                &mut slot.outputs,
            );
            if let Err(err) = node.evaluate(&mut ctx) {
                tracing::warn!(node = node.type_name(), id = id.0, error = %err, "node evaluation failed");
                slot.outputs = node.sockets().initial_outputs();
            }
        }
        Ok(())
    }

    /// Uninitialize every node state. Safe to call repeatedly.
    pub fn release(&mut self, graph: &NodeGraph) {
        for (id, mut slot) in self.slots.drain() {
            if !slot.initialized {
                continue;
            }
            match graph.entry(id) {
                Some(entry) => entry.node.uninitialize_for_context(&mut slot.state),
                None => {
                    slot.state.clear();
                }
            }
        }
        self.last_time = None;
    }
}

impl std::fmt::Debug for GraphInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphInstance")
            .field("live_nodes", &self.live_nodes())
            .field("last_time", &self.last_time)
            .finish()
    }
}

fn resolve_inputs(
    graph: &NodeGraph,
    slots: &HashMap<NodeId, NodeSlot>,
    id: NodeId,
    entry: &NodeEntry,
) -> Vec<Box<dyn SocketValue>> {
    entry
        .node
        .sockets()
        .inputs
        .iter()
        .enumerate()
        .map(|(index, decl)| {
            let fallback = || (*entry.defaults[index]).clone_value();
            let Some(link) = graph.links.get(&(id, index)) else {
                return fallback();
            };
            let upstream: Option<&dyn SocketValue> = slots
                .get(&link.source)
                .and_then(|s| s.outputs.get(link.output))
                .and_then(|o| o.as_deref());
            match (link.route, upstream) {
                (Route::Direct, Some(value)) => value.clone_value(),
                (Route::Converted(r), Some(value)) => decl
                    .receivers
                    .get(r)
                    .and_then(|receiver| (receiver.convert)(value.as_any()))
                    .unwrap_or_else(fallback),
                _ => fallback(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/node/graph.rs"]
mod tests;
