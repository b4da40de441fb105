//! The stepping state machine.
//!
//! The [`Stepper`] owns the whole exploration session: the graph, the history
//! of stepped nodes and the derived view state (active memory snapshot, arena,
//! exported graph). It is the only writer; collaborators read through
//! [`Stepper::session`] or listen on the [`EventBus`].
//!
//! ```text
//!            start_interactive / step_forward
//!   Idle ──────────────────────────────────────► AwaitingExpansion
//!                                                    │ update_interactive
//!                      click (children known)        ▼
//!   Stepped ◄─────────────────────────────────── Stepped
//!      │ step_back
//!      ▼
//!   Stepped (history popped)
//! ```

use execgraph_core::{ExecNode, GraphStore, MemorySnapshot, NodeId, ResultTree};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ExplorationConfig, InteractiveMode, InteractiveOption};
use crate::engine::{EngineRequest, EngineResponse, ExecutionEngine};
use crate::error::{ExploreError, ExploreResult};
use crate::events::EventBus;
use crate::export::{export_graph, ExportedGraph};
use crate::visibility::VisibilityEngine;

/// Upper bound on request/response rounds in a single [`Stepper::drive`].
const MAX_DRIVE_ROUNDS: usize = 64;

/// Where the stepper is in its request cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepperState {
    /// No exploration in progress.
    #[default]
    Idle,
    /// A request is in flight; `None` for the initial state.
    AwaitingExpansion(Option<NodeId>),
    /// A frontier has been revealed.
    Stepped,
}

/// Result of a stepper entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// `active` was stepped and `frontier` revealed; empty at the end of execution.
    Stepped {
        active: NodeId,
        frontier: Vec<NodeId>,
    },
    /// The node was already expanded; its state was displayed again.
    Refocused(NodeId),
    /// The engine must answer this request before exploration can continue.
    ExpansionRequested(EngineRequest),
}

impl StepOutcome {
    pub fn frontier(&self) -> &[NodeId] {
        match self {
            StepOutcome::Stepped { frontier, .. } => frontier,
            _ => &[],
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, StepOutcome::ExpansionRequested(_))
    }
}

/// Session data owned by the stepper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub graph: GraphStore,
    /// Nodes stepped from, most recent last.
    pub history: Vec<NodeId>,
    /// Source line of the node the last step started from.
    pub last_source_line: Option<u32>,
    /// Highest identifier received from the engine.
    pub last_node_id: Option<NodeId>,
    pub arena: String,
    pub memory: Option<MemorySnapshot>,
    pub exported: ExportedGraph,
}

/// Interactive explorer over an execution graph.
#[derive(Debug, Default)]
pub struct Stepper {
    session: SessionContext,
    config: ExplorationConfig,
    state: StepperState,
    events: EventBus,
}

impl Stepper {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn graph(&self) -> &GraphStore {
        &self.session.graph
    }

    pub fn history(&self) -> &[NodeId] {
        &self.session.history
    }

    pub fn exported(&self) -> &ExportedGraph {
        &self.session.exported
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn state(&self) -> StepperState {
        self.state
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Identifier of the selected node.
    pub fn selected(&self) -> Option<NodeId> {
        self.session.graph.selected().map(|n| n.id)
    }

    pub fn set_mode(&mut self, mode: InteractiveMode) {
        self.config.mode = mode;
        debug!(mode = %mode, "mode_changed");
        self.redraw();
    }

    /// Flip a display option and redraw.
    pub fn toggle(&mut self, option: InteractiveOption) {
        self.config.toggle(option);
        debug!(?option, skip_tau = self.config.skip_tau, hide_tau = self.config.hide_tau, "option_toggled");
        self.redraw();
    }

    /// Start a session from the engine's initial tree, which must hold exactly
    /// the root. On success the root is stepped right away.
    pub fn start_interactive(&mut self, initial: ResultTree) -> ExploreResult<StepOutcome> {
        if initial.nodes.len() != 1 {
            let count = initial.nodes.len();
            warn!(count, "impossible to initialise interactive mode");
            return Err(ExploreError::MalformedStart { count });
        }

        self.reset_interactive();
        let Some(raw) = initial.nodes.into_iter().next() else {
            return Err(ExploreError::MalformedStart { count: 0 });
        };
        let root = ExecNode::root(raw);
        let root_id = root.id;
        self.session.graph.push_node(root);
        self.session.last_node_id = Some(root_id);
        info!(root = root_id.0, "interactive_started");

        self.click(root_id)
    }

    /// Drop the session graph and everything derived from it.
    pub fn reset_interactive(&mut self) {
        self.session = SessionContext::default();
        self.state = StepperState::Idle;
        self.events.dirty.emit(());
        self.refresh_export();
    }

    /// Reset and ask the engine for a fresh execution.
    pub fn restart_interactive(&mut self) -> StepOutcome {
        self.reset_interactive();
        self.request_initial()
    }

    fn request_initial(&mut self) -> StepOutcome {
        self.state = StepperState::AwaitingExpansion(None);
        StepOutcome::ExpansionRequested(EngineRequest::Initial)
    }

    /// Step from the selected node, or request a new execution when the graph
    /// is empty.
    pub fn step_forward(&mut self) -> ExploreResult<StepOutcome> {
        if self.session.graph.is_empty() {
            return Ok(self.request_initial());
        }
        let Some(active) = self.selected() else {
            warn!("step_forward_without_selection");
            return Err(ExploreError::NoSelection);
        };
        self.click(active)
    }

    /// Activate a node: fetch its successors, step from it, or show it again.
    /// Only visible nodes can be activated.
    pub fn click(&mut self, active: NodeId) -> ExploreResult<StepOutcome> {
        let has_children = !self.session.graph.children(active).is_empty();
        let node = self
            .session
            .graph
            .get_mut(active)
            .ok_or(ExploreError::UnknownNode { node_id: active })?;
        if !node.visible {
            warn!(node = active.0, "click_on_hidden_node");
            return Err(ExploreError::HiddenNode { node_id: active });
        }

        if !has_children && !node.expanded {
            let request = EngineRequest::Expand {
                node_id: active,
                state: node.engine_state.clone(),
                seed: self.session.last_node_id,
            };
            self.state = StepperState::AwaitingExpansion(Some(active));
            debug!(node = active.0, "expansion_requested");
            return Ok(StepOutcome::ExpansionRequested(request));
        }

        let outcome = if node.can_step {
            node.can_step = false;
            self.execute_interactive_step(active)?
        } else {
            self.focus(active)?;
            StepOutcome::Refocused(active)
        };
        self.events
            .update_interactive
            .emit(self.session.exported.clone());
        Ok(outcome)
    }

    /// Merge the successors of `active` received from the engine and step.
    ///
    /// A node is expanded at most once: a second answer for it is rejected
    /// and the session is left untouched, as it is when the merge fails.
    pub fn update_interactive(&mut self, active: NodeId, tree: ResultTree) -> ExploreResult<StepOutcome> {
        let node = self
            .session
            .graph
            .get(active)
            .ok_or(ExploreError::UnknownActiveNode { node_id: active })?;
        if node.expanded {
            warn!(node = active.0, "duplicate_expansion");
            return Err(ExploreError::AlreadyExpanded { node_id: active });
        }
        if self.state != StepperState::AwaitingExpansion(Some(active)) {
            warn!(node = active.0, state = ?self.state, "unexpected_expansion");
        }

        let max_id = tree.max_node_id();
        let inserted = self.session.graph.merge_tree(tree)?;
        debug!(node = active.0, inserted = inserted.len(), "expansion_merged");

        if let Some(node) = self.session.graph.get_mut(active) {
            node.can_step = false;
            node.expanded = true;
            node.engine_state = None;
        }
        self.session.last_node_id = self.session.last_node_id.max(max_id);

        let outcome = self.execute_interactive_step(active)?;
        self.events
            .update_interactive
            .emit(self.session.exported.clone());
        Ok(outcome)
    }

    /// Feed an engine answer into the session.
    pub fn handle_response(&mut self, response: EngineResponse) -> ExploreResult<StepOutcome> {
        match response {
            EngineResponse::Initial { steps } => self.start_interactive(steps),
            EngineResponse::Stepping { active_id, steps } => self.update_interactive(active_id, steps),
        }
    }

    /// Answer outstanding requests with `engine` until the step settles.
    pub fn drive<E>(&mut self, engine: &mut E, mut outcome: StepOutcome) -> ExploreResult<StepOutcome>
    where
        E: ExecutionEngine + ?Sized,
    {
        for _ in 0..MAX_DRIVE_ROUNDS {
            let StepOutcome::ExpansionRequested(request) = &outcome else {
                return Ok(outcome);
            };
            let response = engine.handle(request)?;
            outcome = self.handle_response(response)?;
        }
        Err(ExploreError::Engine {
            message: format!("step did not settle after {MAX_DRIVE_ROUNDS} requests"),
        })
    }

    /// Undo the most recent step.
    ///
    /// Every visible descendant of the stepped node is hidden again (and made
    /// non-steppable), and the node becomes the steppable selection.
    pub fn step_back(&mut self) -> ExploreResult<NodeId> {
        let Some(&active) = self.session.history.last() else {
            warn!("step_back_at_beginning");
            return Err(ExploreError::EmptyHistory);
        };
        if !self.session.graph.contains(active) {
            return Err(ExploreError::UnknownNode { node_id: active });
        }
        self.session.history.pop();

        let graph = &mut self.session.graph;
        for id in graph.visible_descendants(active) {
            if let Some(node) = graph.get_mut(id) {
                node.visible = false;
                node.can_step = false;
            }
        }
        for node in graph.nodes_mut() {
            node.selected = node.id == active;
        }
        if let Some(node) = graph.get_mut(active) {
            node.can_step = true;
        }

        self.focus(active)?;
        self.state = StepperState::Stepped;
        self.refresh_export();
        self.events
            .update_interactive
            .emit(self.session.exported.clone());
        debug!(node = active.0, depth = self.session.history.len(), "stepped_back");
        Ok(active)
    }

    fn execute_interactive_step(&mut self, active: NodeId) -> ExploreResult<StepOutcome> {
        let last_line = self.session.graph.get(active).and_then(ExecNode::source_line);
        self.session.last_source_line = last_line;

        let frontier = VisibilityEngine::new(&self.config, last_line).reveal_children(
            &mut self.session.graph,
            active,
            false,
        );

        let focus = frontier.first().copied().unwrap_or(active);
        for node in self.session.graph.nodes_mut() {
            if frontier.contains(&node.id) {
                node.can_step = true;
            }
            node.selected = node.id == focus;
        }

        self.focus(focus)?;
        self.session.history.push(active);
        self.state = StepperState::Stepped;
        self.refresh_export();

        debug!(
            node = active.0,
            frontier = frontier.len(),
            depth = self.session.history.len(),
            "interactive_step"
        );
        Ok(StepOutcome::Stepped { active, frontier })
    }

    /// Load a node's memory and arena and point the source highlighter at it.
    fn focus(&mut self, id: NodeId) -> ExploreResult<()> {
        let node = self
            .session
            .graph
            .get(id)
            .ok_or(ExploreError::UnknownNode { node_id: id })?;

        self.session.arena = node.arena.clone();
        if let Some(memory) = &node.memory {
            self.session.memory = Some(memory.clone());
            self.events.update_memory.emit(memory.clone());
        }
        self.events.clear.emit(());
        if let Some(location) = &node.location {
            self.events.mark_interactive.emit(location.clone());
        }
        Ok(())
    }

    fn refresh_export(&mut self) {
        self.session.exported = export_graph(&self.session.graph, self.config.hide_tau);
    }

    fn redraw(&mut self) {
        self.refresh_export();
        self.events
            .update_interactive
            .emit(self.session.exported.clone());
    }
}
