//! Projection of the visible part of the graph for renderers.
//!
//! The projection is rebuilt from scratch on every state change and holds no
//! state of its own.

use std::collections::HashMap;

use execgraph_core::{GraphStore, NodeId};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};

/// A node as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderNode {
    /// Click target; feed back into `Stepper::click`.
    pub id: NodeId,
    pub label: String,
    pub selected: bool,
    pub steppable: bool,
}

/// A directed edge between two rendered nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Renderable description of the visible execution graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedGraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

/// Graphviz output settings.
#[derive(Debug, Clone)]
pub struct DotConfig {
    pub graph_name: String,
    pub font_size: u32,
    /// Link attached to every node; `{id}` is replaced by the node identifier.
    pub click_href: Option<String>,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            graph_name: "Execution".to_string(),
            font_size: 12,
            click_href: None,
        }
    }
}

impl DotConfig {
    /// Links calling back into a browser front end.
    pub fn with_click_href(mut self, template: impl Into<String>) -> Self {
        self.click_href = Some(template.into());
        self
    }
}

/// Project the visible subset of `store`.
///
/// With `hide_tau` only non-tau nodes and shortcut edges are kept; otherwise
/// every visible node and the raw edges. An edge is kept only when both of its
/// endpoints are visible.
pub fn export_graph(store: &GraphStore, hide_tau: bool) -> ExportedGraph {
    let nodes = store
        .nodes()
        .filter(|n| n.visible && !(hide_tau && n.is_tau()))
        .map(|n| RenderNode {
            id: n.id,
            label: n.label.clone(),
            selected: n.selected,
            steppable: n.can_step,
        })
        .collect();

    let is_visible = |id: NodeId| store.get(id).is_some_and(|n| n.visible);
    let edges = store
        .edges()
        .iter()
        .filter(|e| e.is_tau != hide_tau)
        .filter(|e| is_visible(e.from) && is_visible(e.to))
        .map(|e| RenderEdge {
            from: e.from,
            to: e.to,
        })
        .collect();

    ExportedGraph { nodes, edges }
}

impl ExportedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn selected(&self) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.selected)
    }

    pub fn to_dot(&self) -> String {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Graphviz source: boxes, blue border on the selected node, blue
    /// underlined label on steppable nodes.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> String {
        let mut dot = format!(
            "digraph {} {{ node [shape=box, fontsize={}];",
            config.graph_name, config.font_size
        );

        for node in &self.nodes {
            let mut attrs = Vec::new();
            if let Some(template) = &config.click_href {
                let href = template.replace("{id}", &node.id.0.to_string());
                attrs.push(format!("href=\"{href}\""));
            }
            if node.selected {
                attrs.push("color=\"blue\"".to_string());
            }
            let label = escape_html(&node.label);
            if node.steppable {
                attrs.push("fontcolor=\"blue\"".to_string());
                attrs.push(format!("label=<<u>{label}</u>>"));
            } else {
                attrs.push(format!("label=<{label}>"));
            }
            dot.push_str(&format!("{}[{}];", node.id, attrs.join(", ")));
        }

        for edge in &self.edges {
            dot.push_str(&format!("{}->{};", edge.from, edge.to));
        }

        dot.push('}');
        dot
    }

    /// Convert to a petgraph StableDiGraph for analysis.
    /// Returns the graph and a mapping from NodeId to NodeIndex.
    pub fn to_petgraph(&self) -> (StableDiGraph<RenderNode, ()>, HashMap<NodeId, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in &self.nodes {
            let idx = graph.add_node(node.clone());
            id_to_index.insert(node.id, idx);
        }

        for edge in &self.edges {
            if let (Some(&from_idx), Some(&to_idx)) =
                (id_to_index.get(&edge.from), id_to_index.get(&edge.to))
            {
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        (graph, id_to_index)
    }
}

/// Escape text for a Graphviz HTML-like label.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
