//! Exploration settings: how far a single step travels and what is shown.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Policy deciding where a forward step pauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveMode {
    /// Pause at memory-affecting transitions and nondeterministic choices.
    #[default]
    Memory,
    /// Pause at every transition of the core program.
    Core,
    /// Pause whenever the C source line changes.
    #[serde(rename = "cline")]
    SourceLine,
}

impl InteractiveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractiveMode::Memory => "memory",
            InteractiveMode::Core => "core",
            InteractiveMode::SourceLine => "cline",
        }
    }
}

impl std::fmt::Display for InteractiveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractiveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(InteractiveMode::Memory),
            "core" => Ok(InteractiveMode::Core),
            "cline" | "line" | "source_line" => Ok(InteractiveMode::SourceLine),
            other => Err(format!("unknown interactive mode: {other}")),
        }
    }
}

/// A boolean exploration option that can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveOption {
    SkipTau,
    HideTau,
}

/// Settings used by the visibility engine and the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    #[serde(default)]
    pub mode: InteractiveMode,
    /// Step over tau transitions instead of pausing on them.
    #[serde(default = "default_true")]
    pub skip_tau: bool,
    /// Render only non-tau nodes and shortcut edges.
    #[serde(default = "default_true")]
    pub hide_tau: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            mode: InteractiveMode::default(),
            skip_tau: true,
            hide_tau: true,
        }
    }
}

impl ExplorationConfig {
    /// Pause on every core transition, tau steps included.
    pub fn core_steps() -> Self {
        Self {
            mode: InteractiveMode::Core,
            skip_tau: false,
            hide_tau: false,
        }
    }

    pub fn with_mode(mut self, mode: InteractiveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Flip an option. Tau nodes can only stay hidden while they are skipped.
    pub fn toggle(&mut self, option: InteractiveOption) {
        match option {
            InteractiveOption::SkipTau => self.skip_tau = !self.skip_tau,
            InteractiveOption::HideTau => self.hide_tau = !self.hide_tau,
        }
        self.hide_tau = self.skip_tau && self.hide_tau;
    }
}
