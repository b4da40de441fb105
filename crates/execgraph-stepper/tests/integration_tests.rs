//! Integration tests for execgraph-stepper driving recorded executions.

use std::collections::BTreeMap;

use execgraph_core::NodeId;
use execgraph_stepper::test_fixtures::{int_snapshot, memory_chain, tau_chain, TreeBuilder};
use execgraph_stepper::{
    render_memory_dot, EngineRequest, ExplorationConfig, ExploreError, InteractiveMode,
    InteractiveOption, ListenerId, RecordedEngine, RenderEdge, StepOutcome, Stepper,
};

// ============================================================================
// Helpers
// ============================================================================

/// Stepper that has already received the initial state and stepped the root.
fn session(b: TreeBuilder, config: ExplorationConfig) -> (Stepper, RecordedEngine) {
    session_with_engine(RecordedEngine::new(b.build()).unwrap(), config)
}

fn session_with_engine(mut engine: RecordedEngine, config: ExplorationConfig) -> (Stepper, RecordedEngine) {
    let mut stepper = Stepper::new(config);
    let outcome = stepper.step_forward().unwrap();
    stepper.drive(&mut engine, outcome).unwrap();
    (stepper, engine)
}

fn forward(stepper: &mut Stepper, engine: &mut RecordedEngine) -> StepOutcome {
    let outcome = stepper.step_forward().unwrap();
    stepper.drive(engine, outcome).unwrap()
}

/// (visible, selected, can_step) per node.
fn flags(stepper: &Stepper) -> BTreeMap<NodeId, (bool, bool, bool)> {
    stepper
        .graph()
        .nodes()
        .map(|n| (n.id, (n.visible, n.selected, n.can_step)))
        .collect()
}

fn selected_count(stepper: &Stepper) -> usize {
    stepper.graph().nodes().filter(|n| n.selected).count()
}

/// root -> Run -> Run -> ... (`len` visible steps).
fn straight_line(len: usize) -> TreeBuilder {
    let mut b = TreeBuilder::new();
    b.add_chain(b.root(), &vec!["Run"; len]);
    b
}

// ============================================================================
// Tau Elision
// ============================================================================

#[test]
fn tau_chain_is_stepped_over() {
    let (b, leaf) = tau_chain(5);
    let (stepper, _) = session(b, ExplorationConfig::default());

    assert_eq!(stepper.selected(), Some(leaf));
    let exported = stepper.exported();
    let ids: Vec<NodeId> = exported.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![NodeId(0), leaf]);
    assert_eq!(exported.edges, vec![RenderEdge { from: NodeId(0), to: leaf }]);
}

#[test]
fn tau_chain_shown_when_hide_tau_is_off() {
    let (b, leaf) = tau_chain(2);
    let (mut stepper, _) = session(b, ExplorationConfig::default());
    stepper.toggle(InteractiveOption::HideTau);

    let exported = stepper.exported();
    assert_eq!(exported.nodes.len(), 4);
    assert_eq!(exported.edges.len(), 3);
    assert!(exported.edges.iter().all(|e| e != &RenderEdge { from: NodeId(0), to: leaf }));
}

#[test]
fn core_steps_pause_on_tau() {
    let mut b = TreeBuilder::new();
    let ids = b.add_chain(b.root(), &["tau", "Run"]);
    let (mut stepper, mut engine) = session(b, ExplorationConfig::core_steps());

    assert_eq!(stepper.selected(), Some(ids[0]));
    let outcome = forward(&mut stepper, &mut engine);
    assert_eq!(outcome.frontier(), &[ids[1]]);
}

// ============================================================================
// Interactive Modes
// ============================================================================

#[test]
fn memory_mode_stops_on_memory_request() {
    for skip_tau in [true, false] {
        let (b, [_, create, _]) = memory_chain();
        let config = ExplorationConfig {
            skip_tau,
            hide_tau: skip_tau,
            ..ExplorationConfig::default()
        };
        let (stepper, _) = session(b, config);
        assert_eq!(stepper.selected(), Some(create), "skip_tau = {skip_tau}");
    }
}

#[test]
fn memory_mode_stops_on_choice() {
    let mut b = TreeBuilder::new();
    let ids = b.add_chain(b.root(), &["Run", "Non deterministic choice", "Run"]);
    let engine = RecordedEngine::new(b.build()).unwrap().with_extra_depth(3);
    let (stepper, _) = session_with_engine(engine, ExplorationConfig::default());

    assert_eq!(stepper.selected(), Some(ids[1]));
    assert!(!stepper.graph().get(ids[2]).unwrap().visible);
}

#[test]
fn source_line_mode_runs_to_next_line() {
    let mut b = TreeBuilder::new();
    let root = b.root();
    let ids = b.add_chain(root, &["Run", "Run", "Run"]);
    b.set_line(root, 3).set_line(ids[0], 3).set_line(ids[1], 3).set_line(ids[2], 4);
    let engine = RecordedEngine::new(b.build()).unwrap().with_extra_depth(3);
    let config = ExplorationConfig::default().with_mode(InteractiveMode::SourceLine);
    let (stepper, _) = session_with_engine(engine, config);

    assert_eq!(stepper.selected(), Some(ids[2]));
    assert_eq!(stepper.session().last_source_line, Some(3));
}

// ============================================================================
// Stepping Invariants
// ============================================================================

#[test]
fn graph_only_grows_while_stepping() {
    let (mut stepper, mut engine) = session(straight_line(4), ExplorationConfig::default());
    let mut nodes = stepper.graph().node_count();
    let mut edges = stepper.graph().edges().to_vec();

    for _ in 0..4 {
        forward(&mut stepper, &mut engine);
        let graph = stepper.graph();
        assert!(graph.node_count() >= nodes);
        assert!(graph.edge_count() >= edges.len());
        // Earlier edges keep their place; new ones are appended.
        assert_eq!(&graph.edges()[..edges.len()], edges.as_slice());
        nodes = graph.node_count();
        edges = graph.edges().to_vec();
        assert_eq!(selected_count(&stepper), 1);
    }

    for _ in 0..3 {
        stepper.step_back().unwrap();
        assert_eq!(stepper.graph().node_count(), nodes);
        assert_eq!(stepper.graph().edges(), edges.as_slice());
        assert_eq!(selected_count(&stepper), 1);
    }
}

#[test]
fn tau_shortcuts_survive_step_back() {
    let (b, leaf) = tau_chain(3);
    let (mut stepper, mut engine) = session(b, ExplorationConfig::default());
    let edges = stepper.graph().edges().to_vec();
    assert_eq!(stepper.graph().stats().shortcut_edge_count, 1);

    stepper.step_back().unwrap();
    assert_eq!(stepper.graph().edges(), edges.as_slice());
    assert!(stepper.exported().edges.is_empty());

    // Stepping again reuses the known edges.
    forward(&mut stepper, &mut engine);
    assert_eq!(stepper.graph().edges(), edges.as_slice());
    assert_eq!(stepper.selected(), Some(leaf));
}

#[test]
fn step_then_back_is_identity() {
    let (mut stepper, mut engine) = session(straight_line(3), ExplorationConfig::default());
    forward(&mut stepper, &mut engine);
    // Make sure the next node's successors are already known.
    forward(&mut stepper, &mut engine);
    stepper.step_back().unwrap();

    let before = flags(&stepper);
    let depth = stepper.history().len();
    forward(&mut stepper, &mut engine);
    stepper.step_back().unwrap();

    assert_eq!(flags(&stepper), before);
    assert_eq!(stepper.history().len(), depth);
}

#[test]
fn history_tracks_steps() {
    let (mut stepper, mut engine) = session(straight_line(3), ExplorationConfig::default());
    forward(&mut stepper, &mut engine);
    forward(&mut stepper, &mut engine);
    assert_eq!(stepper.history(), &[NodeId(0), NodeId(1), NodeId(2)]);

    assert_eq!(stepper.step_back().unwrap(), NodeId(2));
    assert_eq!(stepper.step_back().unwrap(), NodeId(1));
    assert_eq!(stepper.step_back().unwrap(), NodeId(0));
    assert!(matches!(stepper.step_back(), Err(ExploreError::EmptyHistory)));
}

#[test]
fn step_back_at_beginning_changes_nothing() {
    let (b, _) = memory_chain();
    let mut stepper = Stepper::default();
    stepper.start_interactive(b.initial()).unwrap();
    let before = flags(&stepper);

    let err = stepper.step_back().unwrap_err();
    assert_eq!(err.to_string(), "already in the beginning");
    assert!(!err.is_fatal());
    assert_eq!(flags(&stepper), before);
}

#[test]
fn end_of_execution_keeps_selection() {
    let (mut stepper, mut engine) = session(straight_line(1), ExplorationConfig::default());
    let outcome = forward(&mut stepper, &mut engine);

    assert_eq!(outcome.frontier(), &[] as &[NodeId]);
    assert_eq!(stepper.selected(), Some(NodeId(1)));
    assert_eq!(selected_count(&stepper), 1);
}

#[test]
fn restart_begins_a_new_execution() {
    let (mut stepper, mut engine) = session(straight_line(2), ExplorationConfig::default());
    let outcome = stepper.restart_interactive();
    assert_eq!(outcome, StepOutcome::ExpansionRequested(EngineRequest::Initial));

    stepper.drive(&mut engine, outcome).unwrap();
    assert_eq!(stepper.history(), &[NodeId(0)]);
    assert_eq!(stepper.selected(), Some(NodeId(1)));
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn listeners_receive_step_events() {
    let (mut b, [_, create, _]) = memory_chain();
    b.set_line(create, 7).set_memory(create, "x", "3");
    let mut engine = RecordedEngine::new(b.build()).unwrap();
    let mut stepper = Stepper::default();

    let view = ListenerId(1);
    let (_, graph_rx) = stepper.events().update_interactive.subscribe(view);
    let (_, memory_rx) = stepper.events().update_memory.subscribe(view);
    let (_, mark_rx) = stepper.events().mark_interactive.subscribe(view);
    let (_, source_view_rx) = stepper.events().mark.subscribe(view);

    let outcome = stepper.step_forward().unwrap();
    stepper.drive(&mut engine, outcome).unwrap();

    let graph = graph_rx.try_iter().last().unwrap();
    assert_eq!(graph.selected().map(|n| n.id), Some(create));
    assert_eq!(memory_rx.try_recv().unwrap(), int_snapshot("x", "3"));
    assert_eq!(mark_rx.try_recv().unwrap().line(), 7);
    // Plain source marks belong to the source view, not to stepping.
    assert!(source_view_rx.try_recv().is_err());

    stepper.events().unsubscribe_owner(view);
    assert_eq!(stepper.events().update_interactive.listener_count(), 0);
}

#[test]
fn memory_snapshot_renders() {
    let (mut b, [_, create, _]) = memory_chain();
    b.set_memory(create, "x", "3");
    let (stepper, _) = session(b, ExplorationConfig::default());

    let memory = stepper.session().memory.as_ref().unwrap();
    let dot = render_memory_dot(memory);
    assert!(dot.contains("<b>x</b>"));
    assert!(dot.contains(">3</td>"));
}

#[test]
fn export_is_acyclic() {
    let (stepper, _) = session(straight_line(3), ExplorationConfig::default());
    let (graph, _) = stepper.exported().to_petgraph();
    assert!(!petgraph::algo::is_cyclic_directed(&graph));
}
