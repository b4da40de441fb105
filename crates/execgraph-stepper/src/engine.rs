//! The boundary with the execution engine.
//!
//! The stepper never runs programs itself: it issues [`EngineRequest`]s and is
//! later fed the matching [`EngineResponse`]. [`RecordedEngine`] answers
//! requests out of a fully recorded execution tree, which is how sessions are
//! replayed offline.

use std::collections::{HashMap, HashSet, VecDeque};

use execgraph_core::{classify, NodeId, RawEdge, RawNode, ResultTree};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExploreError, ExploreResult};

/// A request issued by the stepper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineRequest {
    /// Start a new execution and send its initial state.
    Initial,
    /// Compute the successors of a state.
    Expand {
        node_id: NodeId,
        /// Engine continuation stored on the node, if any.
        state: Option<String>,
        /// Highest identifier seen so far; new identifiers must exceed it.
        seed: Option<NodeId>,
    },
}

/// An answer from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EngineResponse {
    /// Initial state of a new execution; must hold exactly one node.
    Initial { steps: ResultTree },
    /// Successors of `active_id`.
    Stepping { active_id: NodeId, steps: ResultTree },
}

/// Something able to answer stepper requests.
pub trait ExecutionEngine {
    fn handle(&mut self, request: &EngineRequest) -> ExploreResult<EngineResponse>;
}

/// Engine replaying a recorded execution tree.
///
/// An expansion returns the successors of the node, continuing through tau
/// states until the first non-tau state on every path, plus `extra_depth`
/// further levels.
#[derive(Debug, Clone)]
pub struct RecordedEngine {
    nodes: HashMap<NodeId, RawNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    root: NodeId,
    extra_depth: usize,
    requests: usize,
}

impl RecordedEngine {
    /// Build from a recorded tree. The root is the node without incoming edge
    /// (lowest identifier on ties).
    pub fn new(tree: ResultTree) -> ExploreResult<Self> {
        let targets: HashSet<NodeId> = tree.edges.iter().map(|e| e.to).collect();
        let root = tree
            .nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| !targets.contains(id))
            .min()
            .ok_or_else(|| ExploreError::Engine {
                message: "recorded tree has no root".to_string(),
            })?;

        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for edge in &tree.edges {
            children.entry(edge.from).or_default().push(edge.to);
        }

        Ok(Self {
            nodes: tree.nodes.into_iter().map(|n| (n.id, n)).collect(),
            children,
            root,
            extra_depth: 0,
            requests: 0,
        })
    }

    /// Parse a recorded tree from JSON.
    pub fn from_json(json: &str) -> ExploreResult<Self> {
        let tree: ResultTree = serde_json::from_str(json)?;
        Self::new(tree)
    }

    pub fn with_extra_depth(mut self, depth: usize) -> Self {
        self.extra_depth = depth;
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests
    }

    fn node(&self, id: NodeId) -> ExploreResult<&RawNode> {
        self.nodes.get(&id).ok_or_else(|| ExploreError::Engine {
            message: format!("state {id} is not part of the recording"),
        })
    }

    fn expand(&self, active: NodeId) -> ExploreResult<ResultTree> {
        self.node(active)?;

        let mut tree = ResultTree::default();
        // (node, remaining extra levels once a non-tau state has been reached)
        let mut queue = VecDeque::from([(active, self.extra_depth)]);
        let mut seen = HashSet::from([active]);

        while let Some((current, budget)) = queue.pop_front() {
            for &child in self.children.get(&current).into_iter().flatten() {
                if !seen.insert(child) {
                    continue;
                }
                let raw = self.node(child)?;
                tree.nodes.push(raw.clone());
                tree.edges.push(RawEdge {
                    from: current,
                    to: child,
                });

                if classify(&raw.label).is_tau() {
                    queue.push_back((child, budget));
                } else if budget > 0 {
                    queue.push_back((child, budget - 1));
                }
            }
        }

        Ok(tree)
    }
}

impl ExecutionEngine for RecordedEngine {
    fn handle(&mut self, request: &EngineRequest) -> ExploreResult<EngineResponse> {
        self.requests += 1;
        match request {
            EngineRequest::Initial => {
                let root = self.node(self.root)?.clone();
                debug!(root = root.id.0, "recorded_initial");
                Ok(EngineResponse::Initial {
                    steps: ResultTree {
                        nodes: vec![root],
                        edges: Vec::new(),
                    },
                })
            }
            EngineRequest::Expand { node_id, .. } => {
                let steps = self.expand(*node_id)?;
                debug!(node = node_id.0, nodes = steps.nodes.len(), "recorded_expand");
                Ok(EngineResponse::Stepping {
                    active_id: *node_id,
                    steps,
                })
            }
        }
    }
}
