//! Append-only store of every state and transition discovered in a session.
//!
//! Nodes live in an arena addressed through an identifier index; edges are
//! kept in insertion order with outgoing/incoming adjacency lists. Nothing is
//! ever removed except by [`GraphStore::clear`].

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{ExecEdge, ExecNode, NodeId, ResultTree};

/// Consistency errors detected while walking the graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An upward walk reached a node with no recorded incoming edge.
    #[error("could not find incoming edge for node {node_id}")]
    MissingIncomingEdge { node_id: NodeId },

    /// An upward walk went around in a loop of tau nodes.
    #[error("tau ancestors of node {node_id} form a cycle")]
    AncestorCycle { node_id: NodeId },
}

/// Node and edge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub visible_count: usize,
    pub tau_node_count: usize,
    pub shortcut_edge_count: usize,
}

/// Index-addressed execution graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStore {
    nodes: Vec<ExecNode>,
    edges: Vec<ExecEdge>,
    index: HashMap<NodeId, usize>,
    /// node -> slots in `edges` where it is the source.
    outgoing: HashMap<NodeId, Vec<usize>>,
    /// node -> slots in `edges` where it is the target.
    incoming: HashMap<NodeId, Vec<usize>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Identifiers are trusted to be fresh.
    pub fn push_node(&mut self, node: ExecNode) {
        if self.index.contains_key(&node.id) {
            warn!(node = node.id.0, "duplicate_node_id");
            return;
        }
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    /// Append an edge.
    pub fn push_edge(&mut self, edge: ExecEdge) {
        let slot = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(slot);
        self.incoming.entry(edge.to).or_default().push(slot);
        self.edges.push(edge);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.index.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&ExecNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ExecNode> {
        match self.index.get(&id) {
            Some(&slot) => Some(&mut self.nodes[slot]),
            None => None,
        }
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExecNode> {
        self.nodes.iter()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut ExecNode> {
        self.nodes.iter_mut()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[ExecEdge] {
        &self.edges
    }

    /// The currently selected node, if any.
    pub fn selected(&self) -> Option<&ExecNode> {
        self.nodes.iter().find(|n| n.selected)
    }

    /// Targets of every edge leaving `id`, in insertion order, without duplicates.
    ///
    /// Targets that are not (yet) known to the store are skipped.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&slot| self.edges[slot].to)
            .filter(|to| self.contains(*to) && seen.insert(*to))
            .collect()
    }

    /// Children reached by a non-tau transition.
    pub fn non_tau_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children_where(id, |n| !n.is_tau())
    }

    /// Children reached by a tau transition.
    pub fn tau_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children_where(id, ExecNode::is_tau)
    }

    fn children_where(&self, id: NodeId, keep: impl Fn(&ExecNode) -> bool) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|c| self.get(*c).is_some_and(&keep))
            .collect()
    }

    /// Every tau node reachable from `id` through tau nodes only.
    ///
    /// The walk stops at the first non-tau node on each path; that boundary is
    /// not part of the result. Breadth-first order.
    pub fn tau_children_transitive_closure(&self, id: NodeId) -> Vec<NodeId> {
        let mut closure = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for child in self.tau_children(current) {
                if seen.insert(child) {
                    closure.push(child);
                    queue.push_back(child);
                }
            }
        }

        closure
    }

    /// First recorded edge whose target is `id`.
    pub fn incoming_edge(&self, id: NodeId) -> Option<&ExecEdge> {
        self.incoming
            .get(&id)
            .and_then(|slots| slots.first())
            .map(|&slot| &self.edges[slot])
    }

    /// Walk incoming edges upward from `id` through tau nodes and return the
    /// first ancestor that is not tau.
    pub fn nearest_non_tau_ancestor(&self, id: NodeId) -> Result<NodeId, StoreError> {
        let mut seen = HashSet::from([id]);
        let mut current = id;

        loop {
            let edge = self
                .incoming_edge(current)
                .ok_or(StoreError::MissingIncomingEdge { node_id: current })?;
            let parent = edge.from;

            if !self.get(parent).is_some_and(ExecNode::is_tau) {
                return Ok(parent);
            }
            if !seen.insert(parent) {
                return Err(StoreError::AncestorCycle { node_id: id });
            }
            current = parent;
        }
    }

    /// Every visible node reachable from `id` through visible nodes.
    ///
    /// `id` itself is excluded. Pre-order, depth-first.
    pub fn visible_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) || !self.get(current).is_some_and(|n| n.visible) {
                continue;
            }
            found.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }

        found
    }

    /// Merge a batch received from the engine.
    ///
    /// New nodes are classified and inserted hidden, in identifier order.
    /// Every edge is recorded raw; every edge into a non-tau node also gets a
    /// shortcut from that node's nearest non-tau ancestor so the hide-tau view
    /// can jump over silent chains. Returns the inserted node identifiers.
    ///
    /// On error the store is left exactly as it was before the call.
    pub fn merge_tree(&mut self, tree: ResultTree) -> Result<Vec<NodeId>, StoreError> {
        let ResultTree { mut nodes, edges } = tree;
        nodes.sort_by_key(|n| n.id);
        let (node_mark, edge_mark) = (self.nodes.len(), self.edges.len());

        let inserted: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        for raw in nodes {
            self.push_node(ExecNode::from_raw(raw));
        }

        for edge in &edges {
            self.push_edge(ExecEdge::raw(edge.from, edge.to));
        }

        let mut shortcuts = Vec::new();
        for edge in &edges {
            let targets_visible = self.get(edge.to).is_some_and(|n| !n.is_tau());
            if targets_visible {
                match self.nearest_non_tau_ancestor(edge.to) {
                    Ok(from) => shortcuts.push(ExecEdge::shortcut(from, edge.to)),
                    Err(err) => {
                        self.truncate(node_mark, edge_mark);
                        return Err(err);
                    }
                }
            }
        }
        for shortcut in shortcuts {
            self.push_edge(shortcut);
        }

        Ok(inserted)
    }

    /// Drop every node and edge appended after the given lengths.
    fn truncate(&mut self, node_len: usize, edge_len: usize) {
        for node in self.nodes.drain(node_len..) {
            self.index.remove(&node.id);
        }
        for edge in self.edges.drain(edge_len..) {
            for (map, id) in [(&mut self.outgoing, edge.from), (&mut self.incoming, edge.to)] {
                if let Some(slots) = map.get_mut(&id) {
                    slots.retain(|&slot| slot < edge_len);
                    if slots.is_empty() {
                        map.remove(&id);
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            visible_count: self.nodes.iter().filter(|n| n.visible).count(),
            tau_node_count: self.nodes.iter().filter(|n| n.is_tau()).count(),
            shortcut_edge_count: self.edges.iter().filter(|e| !e.is_tau).count(),
        }
    }
}
