//! Minimal fixtures for stepper testing.
//!
//! Builds recorded execution trees in memory, without an execution engine.

use execgraph_core::{
    MemoryAllocation, MemorySnapshot, NodeId, Position, RawEdge, RawNode, ResultTree,
    SourceLocation, SourceRange,
};

/// Builder for recorded execution trees. Identifiers are assigned from 0.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<RawNode>,
    edges: Vec<RawEdge>,
    next_id: u64,
}

impl TreeBuilder {
    /// Create a builder holding a single root node labelled `Init`.
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.add_node("Init");
        builder
    }

    /// The root identifier.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add a disconnected node.
    pub fn add_node(&mut self, label: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push(RawNode {
            id,
            label: label.to_string(),
            arena: format!("arena of {id}"),
            state: Some(format!("state of {id}")),
            ..Default::default()
        });
        id
    }

    /// Add a node reached from `parent`.
    pub fn add_child(&mut self, parent: NodeId, label: &str) -> NodeId {
        let id = self.add_node(label);
        self.edges.push(RawEdge { from: parent, to: id });
        id
    }

    /// Add a chain of nodes below `parent`; returns the identifiers in order.
    pub fn add_chain(&mut self, parent: NodeId, labels: &[&str]) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(labels.len());
        let mut current = parent;
        for label in labels {
            current = self.add_child(current, label);
            ids.push(current);
        }
        ids
    }

    /// Attach a C source line to a node.
    pub fn set_line(&mut self, id: NodeId, line: u32) -> &mut Self {
        if let Some(node) = self.node_mut(id) {
            node.loc = Some(location(line));
        }
        self
    }

    /// Attach a single-allocation memory snapshot to a node.
    pub fn set_memory(&mut self, id: NodeId, name: &str, value: &str) -> &mut Self {
        if let Some(node) = self.node_mut(id) {
            node.mem = Some(int_snapshot(name, value));
        }
        self
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RawNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Tree holding only the root, as sent at session start.
    pub fn initial(&self) -> ResultTree {
        ResultTree {
            nodes: self.nodes.iter().filter(|n| n.id == NodeId(0)).cloned().collect(),
            edges: Vec::new(),
        }
    }

    pub fn build(self) -> ResultTree {
        ResultTree {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

/// A location spanning one full line.
pub fn location(line: u32) -> SourceLocation {
    SourceLocation {
        c: SourceRange {
            begin: Position { line, col: 1 },
            end: Position { line, col: 80 },
        },
        core: None,
    }
}

/// A snapshot with one 4-byte `int` named `name`.
pub fn int_snapshot(name: &str, value: &str) -> MemorySnapshot {
    MemorySnapshot(vec![MemoryAllocation {
        id: 1,
        base: 0x10,
        size: 4,
        prefix: Some(name.to_string()),
        ty: "int".to_string(),
        rows: vec![execgraph_core::MemoryRow {
            path: vec![],
            value: value.to_string(),
            size: 4,
            ispadding: false,
            pointsto: None,
        }],
    }])
}

/// `root --tau--> A --CreateRequest--> B --tau--> C`.
pub fn memory_chain() -> (TreeBuilder, [NodeId; 3]) {
    let mut b = TreeBuilder::new();
    let ids = b.add_chain(b.root(), &["tau", "CreateRequest", "tau"]);
    (b, [ids[0], ids[1], ids[2]])
}

/// `root` followed by `len` tau nodes and a single non-tau leaf.
pub fn tau_chain(len: usize) -> (TreeBuilder, NodeId) {
    let mut b = TreeBuilder::new();
    let mut labels = vec!["tau"; len];
    labels.push("Return");
    let ids = b.add_chain(b.root(), &labels);
    let leaf = *ids.last().unwrap_or(&b.root());
    (b, leaf)
}
