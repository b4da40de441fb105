//! egx - replay recorded executions through the interactive stepper.
//!
//! Steps are replayed against a recorded execution tree and the visible graph,
//! memory snapshot or a session summary is written out.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use execgraph_stepper::InteractiveMode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;
mod config;

use commands::{config as config_cmd, replay};
use config::Config;

/// egx - interactive execution graph explorer.
#[derive(Parser, Debug)]
#[command(
    name = "egx",
    author,
    version,
    about = "Replay recorded executions and export the visible graph",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded execution tree.
    ///
    /// The session is started and the root stepped before `--steps` runs.
    Replay {
        /// Recorded execution tree (JSON with `nodes` and `edges`).
        trace: PathBuf,

        /// Interactive mode: memory, core or cline.
        #[arg(short, long)]
        mode: Option<InteractiveMode>,

        /// Pause on tau transitions instead of stepping over them.
        #[arg(long)]
        show_tau_steps: bool,

        /// Render tau nodes and raw edges.
        #[arg(long)]
        show_tau: bool,

        /// Comma separated actions: f (forward), b (back), r (restart) or a node id.
        #[arg(short, long, default_value = "")]
        steps: String,

        /// Output format: dot, json, summary or memory.
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extra non-tau levels returned per expansion.
        #[arg(long, default_value_t = 0)]
        extra_depth: usize,

        /// Link template for DOT nodes; `{id}` is replaced by the node id.
        #[arg(long)]
        href: Option<String>,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Replay {
            trace,
            mode,
            show_tau_steps,
            show_tau,
            steps,
            format,
            output,
            extra_depth,
            href,
        } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if show_tau_steps {
                config.skip_tau = false;
            }
            if show_tau {
                config.hide_tau = false;
            }
            let format = match format {
                Some(format) => format.parse()?,
                None => config.format,
            };

            let options = replay::ReplayOptions {
                trace,
                actions: replay::parse_actions(&steps)?,
                format,
                output,
                extra_depth,
                click_href: href,
            };
            replay::execute(&config, &options)?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => {
                config_cmd::show(&config)?;
            }
            ConfigCommands::Set { key, value } => {
                config_cmd::set(&mut config, &key, &value)?;
            }
            ConfigCommands::Get { key } => {
                config_cmd::get(&config, &key)?;
            }
            ConfigCommands::Reset => {
                config_cmd::reset()?;
            }
            ConfigCommands::Path => {
                if let Some(path) = Config::config_file_path() {
                    println!("{}", path.display());
                } else {
                    println!("(no config file path available)");
                }
            }
        },
    }

    Ok(())
}
