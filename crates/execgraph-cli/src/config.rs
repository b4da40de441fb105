//! CLI configuration management.
//!
//! Values come from the config file, then `.env`/environment variables, then
//! command-line flags, each overriding the previous.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use execgraph_stepper::{ExplorationConfig, InteractiveMode};
use serde::{Deserialize, Serialize};

use crate::commands::replay::OutputFormat;

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interactive mode used when stepping.
    pub mode: InteractiveMode,

    /// Step over tau transitions.
    pub skip_tau: bool,

    /// Render only non-tau nodes.
    pub hide_tau: bool,

    /// Default output format for `replay`.
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        let exploration = ExplorationConfig::default();
        Self {
            mode: exploration.mode,
            skip_tau: exploration.skip_tau,
            hide_tau: exploration.hide_tau,
            format: OutputFormat::Dot,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents).with_context(|| "Failed to parse config file")?
            }
            _ => Self::default(),
        };

        // Environment takes precedence over the file
        if let Ok(mode) = std::env::var("EGX_MODE") {
            config.set("mode", &mode)?;
        }
        if let Ok(skip) = std::env::var("EGX_SKIP_TAU") {
            config.set("skip-tau", &skip)?;
        }
        if let Ok(hide) = std::env::var("EGX_HIDE_TAU") {
            config.set("hide-tau", &hide)?;
        }
        if let Ok(format) = std::env::var("EGX_FORMAT") {
            config.set("format", &format)?;
        }

        Ok(config)
    }

    /// Update a single value by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "mode" => {
                self.mode = value.parse().map_err(anyhow::Error::msg)?;
            }
            "skip-tau" | "skip_tau" => {
                self.skip_tau = parse_bool(value).with_context(|| format!("Invalid value for {key}"))?;
            }
            "hide-tau" | "hide_tau" => {
                self.hide_tau = parse_bool(value).with_context(|| format!("Invalid value for {key}"))?;
            }
            "format" => {
                self.format = value.parse()?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: mode, skip-tau, hide-tau, format",
                key
            ),
        }
        Ok(())
    }

    /// Read a single value by key.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "mode" => self.mode.to_string(),
            "skip-tau" | "skip_tau" => self.skip_tau.to_string(),
            "hide-tau" | "hide_tau" => self.hide_tau.to_string(),
            "format" => self.format.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }

    /// Exploration settings for the stepper. Hiding tau nodes requires
    /// stepping over them.
    pub fn exploration(&self) -> ExplorationConfig {
        ExplorationConfig {
            mode: self.mode,
            skip_tau: self.skip_tau,
            hide_tau: self.skip_tau && self.hide_tau,
        }
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "execgraph", "egx")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}
