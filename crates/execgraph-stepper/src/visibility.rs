//! Tau elision: which descendants a step reveals and where it pauses.
//!
//! A single user step may cross many transitions. The visibility engine
//! reveals the successors of the stepped node and then keeps walking forward
//! along the first candidate for as long as the active [`InteractiveMode`]
//! considers it uninteresting. The walk never goes beyond data already in the
//! [`GraphStore`].

use std::collections::HashSet;

use execgraph_core::{GraphStore, NodeId, TransitionKind};
use tracing::trace;

use crate::config::{ExplorationConfig, InteractiveMode};

/// Decision taken for the first candidate of a frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookAhead {
    Stop,
    Continue,
}

/// Reveals frontiers according to an [`ExplorationConfig`].
#[derive(Debug, Clone, Copy)]
pub struct VisibilityEngine<'a> {
    config: &'a ExplorationConfig,
    /// Source line of the node the step started from.
    last_source_line: Option<u32>,
}

impl<'a> VisibilityEngine<'a> {
    pub fn new(config: &'a ExplorationConfig, last_source_line: Option<u32>) -> Self {
        Self {
            config,
            last_source_line,
        }
    }

    /// Reveal the next frontier below `node`.
    ///
    /// With `is_final` set only the immediate candidates are revealed. Returns
    /// the frontier; empty when `node` has no known successors.
    pub fn reveal_children(&self, store: &mut GraphStore, node: NodeId, is_final: bool) -> Vec<NodeId> {
        let mut frontier = self.reveal_once(store, node);
        if is_final {
            return frontier;
        }

        let mut walked = HashSet::from([node]);
        while let Some(&active) = frontier.first() {
            if !walked.insert(active) || self.look_ahead(store, active) == LookAhead::Stop {
                break;
            }
            let next = self.reveal_once(store, active);
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        trace!(node = node.0, frontier = ?frontier, "frontier_revealed");
        frontier
    }

    /// Mark the immediate candidates of `node` visible and return them.
    fn reveal_once(&self, store: &mut GraphStore, node: NodeId) -> Vec<NodeId> {
        let candidates = if self.config.skip_tau {
            let background = store.tau_children_transitive_closure(node);
            set_visible(store, &background);
            store.non_tau_children(node)
        } else {
            let tau = store.tau_children(node);
            if tau.is_empty() {
                store.children(node)
            } else {
                tau
            }
        };
        set_visible(store, &candidates);
        candidates
    }

    fn look_ahead(&self, store: &GraphStore, active: NodeId) -> LookAhead {
        let Some(node) = store.get(active) else {
            return LookAhead::Stop;
        };

        match self.config.mode {
            InteractiveMode::Memory => match node.kind {
                TransitionKind::MemoryRequest(_) | TransitionKind::NondeterministicChoice => {
                    LookAhead::Stop
                }
                TransitionKind::Tau | TransitionKind::Visible => LookAhead::Continue,
            },
            InteractiveMode::Core => LookAhead::Stop,
            InteractiveMode::SourceLine => {
                if self.last_source_line.is_some() && node.source_line() == self.last_source_line {
                    LookAhead::Continue
                } else {
                    LookAhead::Stop
                }
            }
        }
    }
}

fn set_visible(store: &mut GraphStore, ids: &[NodeId]) {
    for id in ids {
        if let Some(node) = store.get_mut(*id) {
            node.visible = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{memory_chain, tau_chain, TreeBuilder};
    use execgraph_core::{ExecNode, ResultTree};

    /// Load a full recorded tree into a store with the root visible.
    fn load(tree: ResultTree) -> GraphStore {
        let mut store = GraphStore::new();
        let mut tree = tree;
        let root = tree.nodes.remove(0);
        store.push_node(ExecNode::root(root));
        store.merge_tree(tree).unwrap();
        store
    }

    #[test]
    fn test_skip_tau_reveals_leaf_regardless_of_chain_length() {
        for len in [1, 5] {
            let (b, leaf) = tau_chain(len);
            let root = b.root();
            let mut store = load(b.build());
            let config = ExplorationConfig::default();

            let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, true);
            assert_eq!(frontier, vec![leaf], "chain of {len}");

            // The silent path is shown as background context.
            assert_eq!(store.stats().visible_count, len + 2);
        }
    }

    #[test]
    fn test_memory_mode_stops_at_memory_request() {
        for skip_tau in [true, false] {
            let (b, [_, create, _]) = memory_chain();
            let root = b.root();
            let mut store = load(b.build());
            let config = ExplorationConfig {
                skip_tau,
                ..Default::default()
            };

            let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, false);
            assert_eq!(frontier, vec![create], "skip_tau = {skip_tau}");
        }
    }

    #[test]
    fn test_core_mode_stops_at_first_candidate() {
        let (b, [tau, _, _]) = memory_chain();
        let root = b.root();
        let mut store = load(b.build());
        let config = ExplorationConfig::core_steps();

        let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, false);
        assert_eq!(frontier, vec![tau]);
        assert!(!store.get(NodeId(2)).unwrap().visible);
    }

    #[test]
    fn test_memory_mode_stops_at_choice() {
        let mut b = TreeBuilder::new();
        let ids = b.add_chain(b.root(), &["Run", "Non deterministic choice", "Run"]);
        let root = b.root();
        let mut store = load(b.build());
        let config = ExplorationConfig::default();

        let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, false);
        assert_eq!(frontier, vec![ids[1]]);
        assert!(!store.get(ids[2]).unwrap().visible);
    }

    #[test]
    fn test_look_ahead_never_outruns_known_data() {
        let mut b = TreeBuilder::new();
        let ids = b.add_chain(b.root(), &["Run", "Run"]);
        let root = b.root();
        let mut store = load(b.build());
        let config = ExplorationConfig::default();

        let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, false);
        assert_eq!(frontier, vec![ids[1]]);
    }

    #[test]
    fn test_source_line_mode_elides_same_line() {
        let mut b = TreeBuilder::new();
        let ids = b.add_chain(b.root(), &["Run", "Run", "Run"]);
        b.set_line(ids[0], 4).set_line(ids[1], 4).set_line(ids[2], 5);
        let root = b.root();
        let mut store = load(b.build());
        let config = ExplorationConfig::default().with_mode(InteractiveMode::SourceLine);

        let frontier = VisibilityEngine::new(&config, Some(4)).reveal_children(&mut store, root, false);
        assert_eq!(frontier, vec![ids[2]]);

        // Without a previous line nothing is elided.
        let mut b = TreeBuilder::new();
        let ids = b.add_chain(b.root(), &["Run", "Run"]);
        b.set_line(ids[0], 4).set_line(ids[1], 4);
        let root = b.root();
        let mut store = load(b.build());
        let frontier = VisibilityEngine::new(&config, None).reveal_children(&mut store, root, false);
        assert_eq!(frontier, vec![ids[0]]);
    }

    #[test]
    fn test_without_skip_prefers_tau_children() {
        let mut b = TreeBuilder::new();
        let root = b.root();
        let tau = b.add_child(root, "tau");
        let run = b.add_child(root, "Run");
        let mut store = load(b.build());
        let config = ExplorationConfig::core_steps();

        let engine = VisibilityEngine::new(&config, None);
        assert_eq!(engine.reveal_children(&mut store, root, true), vec![tau]);
        assert!(!store.get(run).unwrap().visible);
    }
}
