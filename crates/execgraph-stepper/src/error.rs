//! Error types for the stepper.

use execgraph_core::{NodeId, StoreError};
use thiserror::Error;

/// Result type alias for stepper operations.
pub type ExploreResult<T> = Result<T, ExploreError>;

/// Broad class of an [`ExploreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by a user action; the session is unchanged and usable.
    UserInput,
    /// The engine and the local graph disagree; the session should be reset.
    UpstreamContract,
    /// Session start was rejected; retrying the start is enough.
    MalformedStart,
}

/// Errors that can occur while exploring an execution graph.
#[derive(Debug, Error)]
pub enum ExploreError {
    /// Forward step requested while no node is selected.
    #[error("no selected node")]
    NoSelection,

    /// Backward step requested with an empty history.
    #[error("already in the beginning")]
    EmptyHistory,

    /// The initial tree did not contain exactly one node.
    #[error("cannot start interactive mode with {count} initial nodes (expected 1)")]
    MalformedStart { count: usize },

    /// A node referenced by the caller is not in the graph.
    #[error("node not found: {node_id}")]
    UnknownNode { node_id: NodeId },

    /// A node that is not visible was activated.
    #[error("node {node_id} is not visible")]
    HiddenNode { node_id: NodeId },

    /// An expansion arrived for a node that was already expanded.
    #[error("node {node_id} has already been expanded")]
    AlreadyExpanded { node_id: NodeId },

    /// An expansion arrived for a node the graph does not know.
    #[error("expansion received for unknown active node {node_id}")]
    UnknownActiveNode { node_id: NodeId },

    /// Graph walk failed while merging engine data.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The execution engine failed to answer a request.
    #[error("execution engine error: {message}")]
    Engine { message: String },

    /// Payload (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExploreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExploreError::NoSelection
            | ExploreError::EmptyHistory
            | ExploreError::UnknownNode { .. }
            | ExploreError::HiddenNode { .. } => ErrorKind::UserInput,
            ExploreError::MalformedStart { .. } => ErrorKind::MalformedStart,
            ExploreError::UnknownActiveNode { .. }
            | ExploreError::AlreadyExpanded { .. }
            | ExploreError::Store(_)
            | ExploreError::Engine { .. }
            | ExploreError::Serialization(_) => ErrorKind::UpstreamContract,
        }
    }

    /// Whether the session must be reset before continuing.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::UpstreamContract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ExploreError::EmptyHistory.kind(), ErrorKind::UserInput);
        assert_eq!(
            ExploreError::MalformedStart { count: 2 }.kind(),
            ErrorKind::MalformedStart
        );
        let store = ExploreError::from(StoreError::MissingIncomingEdge { node_id: NodeId(4) });
        assert!(store.is_fatal());
        assert_eq!(store.to_string(), "could not find incoming edge for node n4");
        assert_eq!(ExploreError::HiddenNode { node_id: NodeId(2) }.kind(), ErrorKind::UserInput);
        assert!(ExploreError::AlreadyExpanded { node_id: NodeId(0) }.is_fatal());
    }
}
