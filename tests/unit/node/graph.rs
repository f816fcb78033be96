use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use super::*;
use crate::node::{
    builtin::ConstantNode,
    socket::{InputSocket, OutputSocket},
};

struct Echo {
    sockets: SocketSet,
    input: InputSocket<f32>,
    output: OutputSocket<f32>,
}

impl Echo {
    fn new(default: f32) -> Self {
        let mut b = SocketSet::builder();
        let input = b.input("In", default).accept_numbers().finish();
        let output = b.output("Out");
        Self {
            sockets: b.build(),
            input,
            output,
        }
    }
}

impl Node for Echo {
    fn type_name(&self) -> &'static str {
        "Echo"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let v = ctx.input(self.input)?;
        ctx.set_output(self.output, v);
        Ok(())
    }
}

#[derive(Default)]
struct CounterState {
    evaluations: u32,
    seeks: u32,
}

struct Counter {
    sockets: SocketSet,
    evaluations: OutputSocket<u32>,
    seeks: OutputSocket<u32>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Counter {
    fn new(log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        let mut b = SocketSet::builder();
        let evaluations = b.output("Evaluations");
        let seeks = b.output("Seeks");
        Self {
            sockets: b.build(),
            evaluations,
            seeks,
            log,
        }
    }
}

impl Node for Counter {
    fn type_name(&self) -> &'static str {
        "Counter"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn initialize_for_context(&self, state: &mut StateSlot) -> OpflowResult<()> {
        self.log.lock().unwrap().push("init");
        state.insert(CounterState::default());
        Ok(())
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let seeked = ctx.seeked;
        let st = ctx.state.get_or_insert_with(CounterState::default)?;
        st.evaluations += 1;
        if seeked {
            st.seeks += 1;
        }
        let (evaluations, seeks) = (st.evaluations, st.seeks);
        ctx.set_output(self.evaluations, evaluations);
        ctx.set_output(self.seeks, seeks);
        Ok(())
    }

    fn uninitialize_for_context(&self, state: &mut StateSlot) {
        self.log.lock().unwrap().push("release");
        state.clear();
    }
}

struct Flaky {
    sockets: SocketSet,
    output: OutputSocket<f32>,
    fail: Arc<AtomicBool>,
}

impl Node for Flaky {
    fn type_name(&self) -> &'static str {
        "Flaky"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        ctx.set_output(self.output, 42.0);
        if self.fail.load(Ordering::SeqCst) {
            return Err(OpflowError::evaluation("flaky node failed"));
        }
        Ok(())
    }
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn run(graph: &NodeGraph, instance: &mut GraphInstance, t: f64) {
    let mut items = Vec::new();
    instance.evaluate(graph, secs(t), &mut items).unwrap();
}

#[test]
fn unconnected_input_reads_its_default_every_time() {
    let mut graph = NodeGraph::new();
    let echo = graph.add_node(Echo::new(100.0));
    let mut instance = graph.instantiate(Duration::from_millis(250));

    for frame in 0..5 {
        run(&graph, &mut instance, f64::from(frame) / 30.0);
        assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(100.0));
    }
}

#[test]
fn links_resolve_direct_converted_and_incompatible() {
    let mut graph = NodeGraph::new();
    let float = graph.add_node(ConstantNode::new(3.0_f32));
    let double = graph.add_node(ConstantNode::new(7.5_f64));
    let text = graph.add_node(ConstantNode::new(String::from("nope")));
    let a = graph.add_node(Echo::new(1.0));
    let b = graph.add_node(Echo::new(2.0));
    let c = graph.add_node(Echo::new(5.0));

    assert_eq!(graph.connect(float, "Value", a, "In").unwrap(), Compatibility::Direct);
    assert_eq!(graph.connect(double, "Value", b, "In").unwrap(), Compatibility::Converted);
    assert_eq!(graph.connect(text, "Value", c, "In").unwrap(), Compatibility::Incompatible);
    assert_eq!(graph.compatibility(c, "In"), Some(Compatibility::Incompatible));

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, a, "Out"), Some(3.0));
    assert_eq!(instance.output::<f32>(&graph, b, "Out"), Some(7.5));
    assert_eq!(instance.output::<f32>(&graph, c, "Out"), Some(5.0));
}

#[test]
fn wiring_errors_are_reported() {
    let mut graph = NodeGraph::new();
    let a = graph.add_node(Echo::new(0.0));
    let b = graph.add_node(Echo::new(0.0));

    assert!(matches!(graph.connect(a, "Nope", b, "In"), Err(OpflowError::Graph(_))));
    assert!(matches!(graph.connect(a, "Out", b, "Nope"), Err(OpflowError::Graph(_))));
    assert!(matches!(graph.connect(a, "Out", NodeId(99), "In"), Err(OpflowError::Graph(_))));
    assert!(matches!(graph.connect(a, "Out", a, "In"), Err(OpflowError::Graph(_))));

    graph.connect(a, "Out", b, "In").unwrap();
    let err = graph.connect(b, "Out", a, "In").unwrap_err();
    assert!(err.to_string().contains("cycle"), "{err}");
    assert_eq!(graph.connections().len(), 1);
}

#[test]
fn replacing_connections_is_all_or_nothing() {
    let mut graph = NodeGraph::new();
    let a = graph.add_node(Echo::new(0.0));
    let b = graph.add_node(Echo::new(0.0));
    let c = graph.add_node(Echo::new(0.0));
    graph.connect(a, "Out", b, "In").unwrap();
    graph.connect(b, "Out", c, "In").unwrap();
    let before = graph.connections();

    let wire = |source, target, input: &str| Connection {
        source,
        output: "Out".into(),
        target,
        input: input.into(),
    };
    let bad_socket = [wire(c, a, "In"), wire(a, b, "Missing")];
    assert!(graph.replace_connections(&bad_socket).is_err());
    assert_eq!(graph.connections(), before);

    let cycle = [wire(a, b, "In"), wire(b, c, "In"), wire(c, a, "In")];
    let err = graph.replace_connections(&cycle).unwrap_err();
    assert!(err.to_string().contains("cycle"), "{err}");
    assert_eq!(graph.connections(), before);

    graph.replace_connections(&[wire(c, a, "In")]).unwrap();
    assert_eq!(graph.connections(), [wire(c, a, "In")]);
}

#[test]
fn one_link_per_input() {
    let mut graph = NodeGraph::new();
    let one = graph.add_node(ConstantNode::new(1.0_f32));
    let two = graph.add_node(ConstantNode::new(2.0_f32));
    let echo = graph.add_node(Echo::new(0.0));

    graph.connect(one, "Value", echo, "In").unwrap();
    graph.connect(two, "Value", echo, "In").unwrap();
    let wires = graph.connections();
    assert_eq!(wires.len(), 1);
    assert_eq!(wires[0].source, two);

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(2.0));

    assert!(graph.disconnect(echo, "In"));
    assert!(!graph.disconnect(echo, "In"));
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(0.0));
}

#[test]
fn evaluation_follows_links_not_insertion_order() {
    let mut graph = NodeGraph::new();
    let last = graph.add_node(Echo::new(0.0));
    let middle = graph.add_node(Echo::new(0.0));
    let first = graph.add_node(ConstantNode::new(9.0_f32));
    graph.connect(middle, "Out", last, "In").unwrap();
    graph.connect(first, "Value", middle, "In").unwrap();

    assert_eq!(graph.topological_order(), vec![first, middle, last]);

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, last, "Out"), Some(9.0));
}

#[test]
fn input_defaults_are_type_checked() {
    let mut graph = NodeGraph::new();
    let echo = graph.add_node(Echo::new(0.0));

    graph.set_input_default(echo, "In", 12.0_f32).unwrap();
    let err = graph.set_input_default(echo, "In", 12.0_f64).unwrap_err();
    assert!(matches!(err, OpflowError::TypeMismatch { .. }));
    assert!(graph.set_input_default(echo, "Missing", 1.0_f32).is_err());

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(12.0));
}

#[test]
fn failing_node_degrades_to_defaults_downstream() {
    let fail = Arc::new(AtomicBool::new(false));
    let mut graph = NodeGraph::new();
    let flaky = {
        let mut b = SocketSet::builder();
        let output = b.output_with("Out", 1.0_f32);
        graph.add_node(Flaky {
            sockets: b.build(),
            output,
            fail: fail.clone(),
        })
    };
    let echo = graph.add_node(Echo::new(-1.0));
    graph.connect(flaky, "Out", echo, "In").unwrap();

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(42.0));

    fail.store(true, Ordering::SeqCst);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.output::<f32>(&graph, flaky, "Out"), Some(1.0));
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(1.0));
}

#[test]
fn state_survives_frames_and_seeks_are_flagged() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = NodeGraph::new();
    let counter = graph.add_node(Counter::new(log.clone()));
    let mut instance = graph.instantiate(Duration::from_millis(250));

    for t in [0.0, 0.1, 0.2, 5.0, 5.1, 1.0] {
        run(&graph, &mut instance, t);
    }
    assert_eq!(instance.output::<u32>(&graph, counter, "Evaluations"), Some(6));
    assert_eq!(instance.output::<u32>(&graph, counter, "Seeks"), Some(2));
    assert_eq!(instance.last_time(), Some(secs(1.0)));
    assert_eq!(*log.lock().unwrap(), ["init"]);
}

#[test]
fn release_is_idempotent() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = NodeGraph::new();
    graph.add_node(Counter::new(log.clone()));
    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.live_nodes(), 1);

    instance.release(&graph);
    instance.release(&graph);
    assert_eq!(instance.live_nodes(), 0);
    assert_eq!(instance.last_time(), None);
    assert_eq!(*log.lock().unwrap(), ["init", "release"]);

    run(&graph, &mut instance, 0.0);
    assert_eq!(*log.lock().unwrap(), ["init", "release", "init"]);
}

#[test]
fn removing_a_node_drops_its_links_and_state() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = NodeGraph::new();
    let counter = graph.add_node(Counter::new(log));
    let source = graph.add_node(ConstantNode::new(4.0_f32));
    let echo = graph.add_node(Echo::new(0.5));
    graph.connect(source, "Value", echo, "In").unwrap();

    let mut instance = graph.instantiate(Duration::ZERO);
    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.live_nodes(), 3);

    assert!(graph.remove_node(source).is_some());
    assert!(graph.remove_node(source).is_none());
    assert!(graph.connections().is_empty());
    assert_eq!(graph.len(), 2);

    run(&graph, &mut instance, 0.0);
    assert_eq!(instance.live_nodes(), 2);
    assert_eq!(instance.output::<f32>(&graph, echo, "Out"), Some(0.5));

    let next = graph.add_node(Echo::new(0.0));
    assert!(next.0 > counter.0 && next != source);
}

#[test]
fn connections_serialize_by_socket_name() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node(ConstantNode::new(1.0_f64));
    let echo = graph.add_node(Echo::new(0.0));
    graph.connect(source, "Value", echo, "In").unwrap();

    let json = serde_json::to_value(graph.connections()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{ "source": 0, "output": "Value", "target": 1, "input": "In" }])
    );
    let back: Vec<Connection> = serde_json::from_value(json).unwrap();
    assert_eq!(back, graph.connections());
}
