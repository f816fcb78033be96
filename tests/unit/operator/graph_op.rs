use super::*;
use crate::{
    foundation::ids::NodeId,
    node::builtin::{AddNode, ConstantNode, OutputNode, PropertyNode, RectNode},
    operator::{
        chain::OperatorChain,
        source::{RectShape, register_sources},
    },
    property::{registry::PropertyRegistry, store::CoreObject},
    scene::renderable::{Renderable, RenderableKind},
};

fn rect_graph() -> (NodeGraph, NodeId, NodeId) {
    let mut graph = NodeGraph::new();
    let width = graph.add_node(ConstantNode::new(32_i32));
    let rect = graph.add_node(RectNode::new());
    let out = graph.add_node(OutputNode::new());
    graph.connect(width, "Value", rect, "Width").unwrap();
    graph.connect(rect, "Shape", out, "Item").unwrap();
    (graph, rect, out)
}

#[test]
fn graph_output_joins_the_working_list() {
    let (graph, _, _) = rect_graph();
    let mut chain = OperatorChain::default();
    let id = chain.push(GraphOperator::new(graph));

    let first = chain.evaluate(Duration::ZERO);
    let second = chain.evaluate(Duration::from_millis(40));
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(
        first[0].kind(),
        RenderableKind::Bitmap {
            width: 32,
            height: 100
        }
    );

    chain.remove(id);
    assert!(first[0].is_disposed());
}

#[test]
fn each_context_gets_its_own_instance() {
    let (graph, _, _) = rect_graph();
    let mut op = GraphOperator::new(graph);
    let mut a = StateSlot::new();
    let mut b = StateSlot::new();
    op.initialize_for_context(&mut a).unwrap();
    assert!(a.holds::<GraphInstance>());

    let eval = |op: &mut GraphOperator, state: &mut StateSlot| -> Vec<Renderable> {
        let mut list = Vec::new();
        let mut ctx = EvaluationContext::new(Duration::ZERO, &mut list, state);
        op.evaluate(&mut ctx).unwrap();
        list
    };
    let from_a = eval(&mut op, &mut a);
    let from_b = eval(&mut op, &mut b);
    assert_ne!(from_a, from_b);

    op.uninitialize_for_context(&mut a);
    op.uninitialize_for_context(&mut a);
    assert!(a.is_empty());
    assert!(from_a[0].is_disposed());
    assert!(!from_b[0].is_disposed());
}

#[test]
fn edits_apply_to_live_instances() {
    let (graph, rect, _) = rect_graph();
    let mut chain = OperatorChain::default();
    let mut op = GraphOperator::new(graph);
    let height = op.edit_graph(|g| g.add_node(ConstantNode::new(12.0_f64)));
    op.edit_graph(|g| g.connect(height, "Value", rect, "Height"))
        .unwrap();
    chain.push(op);

    let items = chain.evaluate(Duration::ZERO);
    assert_eq!(
        items[0].kind(),
        RenderableKind::Bitmap {
            width: 32,
            height: 12
        }
    );
}

#[test]
fn properties_come_from_property_nodes() {
    let mut builder = PropertyRegistry::builder();
    register_sources(&mut builder);
    let registry = builder.build().unwrap();
    let shape = RectShape::new(&registry).unwrap();

    let mut graph = NodeGraph::new();
    graph.add_node(PropertyNode::new(shape.store(), &shape.props().width).unwrap());
    graph.add_node(AddNode::new());
    graph.add_node(PropertyNode::new(shape.store(), &shape.props().height).unwrap());
    let op = GraphOperator::new(graph);

    let names: Vec<&str> = op.properties().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["Width", "Height"]);
}

#[test]
fn json_round_trips_wiring() {
    let (graph, rect, out) = rect_graph();
    let mut op = GraphOperator::new(graph);
    let json = op.write_json().unwrap();
    assert_eq!(json["type"], "Graph");
    assert_eq!(json["nodes"][1], serde_json::json!({ "id": 1, "type": "Rect" }));
    assert_eq!(json["connections"].as_array().map(Vec::len), Some(2));

    op.edit_graph(|g| g.disconnect(out, "Item"));
    assert_eq!(op.graph().connections().len(), 1);
    op.read_json(&json).unwrap();
    assert_eq!(op.graph().connections().len(), 2);
    assert!(op.graph().connections().iter().any(|c| c.source == rect && c.target == out));

    let mut dangling = json.clone();
    dangling["connections"][0]["source"] = serde_json::json!(42);
    assert!(op.read_json(&dangling).is_err());
    assert!(op.read_json(&serde_json::json!({ "type": "Fill" })).is_err());
}

#[test]
fn rejected_json_keeps_current_wiring() {
    let (graph, rect, _) = rect_graph();
    let mut op = GraphOperator::new(graph);
    let json = op.write_json().unwrap();
    let before = op.graph().connections();

    let mut unknown_input = json.clone();
    unknown_input["connections"][1]["input"] = serde_json::json!("NoSuchInput");
    assert!(op.read_json(&unknown_input).is_err());
    assert_eq!(op.graph().connections(), before);

    let mut self_loop = json.clone();
    self_loop["connections"][0] = serde_json::json!({
        "source": rect.0, "output": "Shape", "target": rect.0, "input": "Height",
    });
    assert!(op.read_json(&self_loop).is_err());
    assert_eq!(op.graph().connections(), before);

    let mut chain = OperatorChain::default();
    chain.push(op);
    assert_eq!(chain.evaluate(Duration::ZERO).len(), 1);
}
