//! Replay command implementation.
//!
//! Loads a recorded execution tree, drives the stepper through a list of
//! actions and writes the resulting view.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use execgraph_core::NodeId;
use execgraph_stepper::{
    render_memory_dot, DotConfig, ExecutionEngine, RecordedEngine, StepOutcome, Stepper,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;

/// Output format for `replay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Graphviz source of the visible graph.
    Dot,
    /// Exported graph as JSON.
    Json,
    /// Human-readable session summary.
    Summary,
    /// Graphviz source of the current memory snapshot.
    Memory,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dot" | "gv" => Ok(Self::Dot),
            "json" => Ok(Self::Json),
            "summary" | "text" => Ok(Self::Summary),
            "memory" | "mem" => Ok(Self::Memory),
            _ => anyhow::bail!("Unknown format: {}. Use 'dot', 'json', 'summary' or 'memory'", s),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dot => "dot",
            Self::Json => "json",
            Self::Summary => "summary",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// A single user action replayed against the stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Back,
    Restart,
    Click(NodeId),
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "f" | "forward" => Ok(Self::Forward),
            "b" | "back" => Ok(Self::Back),
            "r" | "restart" => Ok(Self::Restart),
            other => {
                let id = other.strip_prefix('n').unwrap_or(other);
                let id: u64 = id
                    .parse()
                    .with_context(|| format!("Unknown step action: {s}. Use f, b, r or a node id"))?;
                Ok(Self::Click(NodeId(id)))
            }
        }
    }
}

/// Parse a comma separated action list such as `f,f,b,n3`.
pub fn parse_actions(list: &str) -> Result<Vec<Action>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Options for a replay run.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub trace: PathBuf,
    pub actions: Vec<Action>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub extra_depth: usize,
    pub click_href: Option<String>,
}

/// Replay a recorded trace and write the requested view.
pub fn execute(config: &Config, options: &ReplayOptions) -> Result<()> {
    let mut engine = load_trace(&options.trace)?.with_extra_depth(options.extra_depth);
    let mut stepper = Stepper::new(config.exploration());

    info!(trace = %options.trace.display(), mode = %config.mode, "Replaying trace");

    let outcome = stepper.step_forward()?;
    stepper.drive(&mut engine, outcome)?;
    for action in &options.actions {
        apply(&mut stepper, &mut engine, *action)?;
    }

    let content = render(&stepper, options)?;
    match &options.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            println!("Wrote {} output to {}", options.format, path.display());
        }
        None => println!("{content}"),
    }

    Ok(())
}

fn load_trace(path: &Path) -> Result<RecordedEngine> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace from {}", path.display()))?;
    RecordedEngine::from_json(&contents)
        .with_context(|| format!("Failed to load trace {}", path.display()))
}

/// Apply one action. Rejected user actions are reported and skipped; engine
/// contract violations abort the replay.
fn apply<E: ExecutionEngine>(stepper: &mut Stepper, engine: &mut E, action: Action) -> Result<()> {
    let result = match action {
        Action::Forward => stepper
            .step_forward()
            .and_then(|outcome| stepper.drive(engine, outcome)),
        Action::Back => stepper.step_back().map(StepOutcome::Refocused),
        Action::Restart => {
            let outcome = stepper.restart_interactive();
            stepper.drive(engine, outcome)
        }
        Action::Click(id) => stepper
            .click(id)
            .and_then(|outcome| stepper.drive(engine, outcome)),
    };

    match result {
        Ok(_) => Ok(()),
        Err(err) if !err.is_fatal() => {
            warn!(?action, error = %err, "Action rejected");
            eprintln!("warning: {action:?}: {err}");
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("{action:?} failed"))),
    }
}

fn render(stepper: &Stepper, options: &ReplayOptions) -> Result<String> {
    let content = match options.format {
        OutputFormat::Dot => {
            let mut dot = DotConfig::default();
            if let Some(href) = &options.click_href {
                dot = dot.with_click_href(href.clone());
            }
            stepper.exported().to_dot_with_config(&dot)
        }
        OutputFormat::Json => serde_json::to_string_pretty(stepper.exported())?,
        OutputFormat::Summary => summary(stepper),
        OutputFormat::Memory => match &stepper.session().memory {
            Some(memory) => render_memory_dot(memory),
            None => anyhow::bail!("No memory snapshot is loaded at the selected node"),
        },
    };
    Ok(content)
}

fn summary(stepper: &Stepper) -> String {
    let session = stepper.session();
    let stats = session.graph.stats();
    let history: Vec<String> = session.history.iter().map(NodeId::to_string).collect();
    let steppable: Vec<String> = stepper
        .exported()
        .nodes
        .iter()
        .filter(|n| n.steppable)
        .map(|n| format!("{} ({})", n.id, n.label))
        .collect();
    let selected = stepper
        .selected()
        .and_then(|id| stepper.graph().get(id))
        .map(|n| format!("{} ({})", n.id, n.label))
        .unwrap_or_else(|| "(none)".to_string());

    let mut lines = vec![
        format!("Mode:       {}", stepper.config().mode),
        format!("Selected:   {selected}"),
        format!("History:    {}", if history.is_empty() { "(empty)".to_string() } else { history.join(" -> ") }),
        format!("Steppable:  {}", if steppable.is_empty() { "(none)".to_string() } else { steppable.join(", ") }),
        format!("Nodes:      {} visible / {} known ({} tau)", stats.visible_count, stats.node_count, stats.tau_node_count),
        format!("Edges:      {} known ({} shortcuts)", stats.edge_count, stats.shortcut_edge_count),
    ];
    if let Some(memory) = &session.memory {
        lines.push(format!("Memory:     {} allocations", memory.allocations().len()));
    }
    lines.join("\n")
}
