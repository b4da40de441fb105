//! Core domain types shared across the execution-graph workspace.
//!
//! An execution graph is a tree of program states (nodes) linked by
//! transitions (edges). The execution engine hands states over in batches
//! ([`ResultTree`]); the [`GraphStore`] keeps every state ever received and only
//! toggles flags on them afterwards.

use serde::{Deserialize, Serialize};

mod store;

pub use store::{GraphStore, StoreError, StoreStats};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a program state, assigned by the execution engine.
///
/// Identifiers are handed out monotonically and stay stable for the whole
/// exploration session.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =============================================================================
// Transition classification
// =============================================================================

/// Memory-lifecycle transition performed by the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryRequestKind {
    /// A new allocation was created.
    Create,
    /// A value was stored into an allocation.
    Store,
    /// An allocation was killed (end of lifetime / free).
    Kill,
}

/// Classification of the transition leading into a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Internal step that is not meaningful to the user.
    Tau,
    /// A transition that changes the memory layout.
    MemoryRequest(MemoryRequestKind),
    /// A branching point where the engine picked one of several executions.
    NondeterministicChoice,
    /// Any other user-visible transition.
    Visible,
}

impl TransitionKind {
    /// Whether this is a silent transition.
    pub fn is_tau(&self) -> bool {
        matches!(self, TransitionKind::Tau)
    }

    /// Whether this transition affects memory.
    pub fn is_memory_request(&self) -> bool {
        matches!(self, TransitionKind::MemoryRequest(_))
    }
}

/// Classify a raw transition label sent by the engine.
///
/// This is the only place where labels are inspected; everything downstream
/// works on the returned [`TransitionKind`].
pub fn classify(label: &str) -> TransitionKind {
    match label {
        "CreateRequest" => TransitionKind::MemoryRequest(MemoryRequestKind::Create),
        "StoreRequest" => TransitionKind::MemoryRequest(MemoryRequestKind::Store),
        "KillRequest" => TransitionKind::MemoryRequest(MemoryRequestKind::Kill),
        "Non deterministic choice" => TransitionKind::NondeterministicChoice,
        _ if label.contains("tau") && !label.contains("End") => TransitionKind::Tau,
        _ => TransitionKind::Visible,
    }
}

// =============================================================================
// Source locations
// =============================================================================

/// A line/column position in the source buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

/// A half-open source range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub begin: Position,
    pub end: Position,
}

/// Source association of a program state.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Range in the C source.
    pub c: SourceRange,
    /// Range in the elaborated core program, when the engine provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<SourceRange>,
}

impl SourceLocation {
    /// Line where this location starts in the C source.
    pub fn line(&self) -> u32 {
        self.c.begin.line
    }
}

// =============================================================================
// Memory snapshots
// =============================================================================

/// One row of an allocation's byte layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRow {
    /// Member path inside the allocation (e.g. `["s", "x"]`).
    pub path: Vec<String>,
    /// Rendered value; a numeric address when `pointsto` is set.
    pub value: String,
    /// Number of bytes covered by this row.
    pub size: u64,
    /// Whether the row is padding.
    #[serde(default)]
    pub ispadding: bool,
    /// Provenance (allocation id) of a pointer value.
    #[serde(default)]
    pub pointsto: Option<u64>,
}

/// A single allocation in a memory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocation {
    pub id: u64,
    pub base: u64,
    pub size: u64,
    /// Name of the object; `None` for anonymous allocations.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub rows: Vec<MemoryRow>,
}

impl MemoryAllocation {
    /// Whether `addr` falls inside this allocation.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// Memory image valid at a program state. Passed through unchanged.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemorySnapshot(pub Vec<MemoryAllocation>);

impl MemorySnapshot {
    pub fn allocations(&self) -> &[MemoryAllocation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Allocation whose address range contains `addr`.
    pub fn allocation_at(&self, addr: u64) -> Option<&MemoryAllocation> {
        self.0.iter().find(|a| a.contains(addr))
    }

    /// Allocation with the given provenance id.
    pub fn allocation(&self, id: u64) -> Option<&MemoryAllocation> {
        self.0.iter().find(|a| a.id == id)
    }
}

// =============================================================================
// Engine payloads
// =============================================================================

/// A program state as sent by the execution engine.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    pub label: String,
    /// Opaque serialized engine state, shown as-is.
    #[serde(default)]
    pub arena: String,
    #[serde(default)]
    pub mem: Option<MemorySnapshot>,
    #[serde(default)]
    pub loc: Option<SourceLocation>,
    /// Engine-side continuation, sent back when this state is expanded.
    #[serde(default)]
    pub state: Option<String>,
}

/// A raw transition as sent by the execution engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// A batch of states and transitions produced by one engine request.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTree {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

impl ResultTree {
    /// Highest node identifier in the batch.
    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.id).max()
    }
}

// =============================================================================
// Graph elements
// =============================================================================

/// A program state tracked by the [`GraphStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecNode {
    pub id: NodeId,
    pub label: String,
    /// Classification fixed at insertion.
    pub kind: TransitionKind,
    /// Whether the node is currently exposed to the user.
    pub visible: bool,
    /// Whether this is the active node.
    pub selected: bool,
    /// Whether stepping from this node is currently allowed.
    pub can_step: bool,
    /// Whether the engine already sent this node's successors.
    pub expanded: bool,
    pub memory: Option<MemorySnapshot>,
    pub location: Option<SourceLocation>,
    pub arena: String,
    /// Engine continuation; dropped once the node has been expanded.
    pub engine_state: Option<String>,
}

impl ExecNode {
    /// Build a hidden node from an engine payload, classifying its label.
    pub fn from_raw(raw: RawNode) -> Self {
        Self {
            id: raw.id,
            kind: classify(&raw.label),
            label: raw.label,
            visible: false,
            selected: false,
            can_step: false,
            expanded: false,
            memory: raw.mem,
            location: raw.loc,
            arena: raw.arena,
            engine_state: raw.state,
        }
    }

    /// Build the session root: visible, selected, steppable and never tau.
    pub fn root(raw: RawNode) -> Self {
        let mut node = Self::from_raw(raw);
        if node.kind.is_tau() {
            node.kind = TransitionKind::Visible;
        }
        node.visible = true;
        node.selected = true;
        node.can_step = true;
        node
    }

    pub fn is_tau(&self) -> bool {
        self.kind.is_tau()
    }

    /// Line of the C source location, if any.
    pub fn source_line(&self) -> Option<u32> {
        self.location.as_ref().map(SourceLocation::line)
    }
}

/// A directed transition between two program states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// `true` for raw transitions as received, `false` for the synthetic
    /// shortcut from a nearest non-tau ancestor used by the hide-tau view.
    pub is_tau: bool,
}

impl ExecEdge {
    pub fn raw(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            is_tau: true,
        }
    }

    pub fn shortcut(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            is_tau: false,
        }
    }
}
