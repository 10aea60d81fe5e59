pub mod simulate;

use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rampart_model::Mode;

use crate::loader::{ConfigSource, RampartConfig};

pub use simulate::{SimulateOptions, SimulationReport, simulate};

#[derive(Debug, Parser)]
#[command(
    name = "rampartctl",
    version,
    about = "Inspect Rampart configuration and run scan simulations"
)]
pub struct Cli {
    /// Read configuration from this file instead of the usual lookup
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run scans against an in-memory demo site and print their events
    Simulate {
        /// Operating mode for the run (defaults to the configured mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Number of demo hosts; one subtree scan is started per host
        #[arg(long, default_value_t = 2)]
        hosts: usize,
        /// Depth of each host's page tree
        #[arg(long, default_value_t = 2)]
        depth: usize,
        /// Links per page
        #[arg(long, default_value_t = 3)]
        fanout: usize,
        /// Simulated latency of every request, in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
        /// Exclude pattern (regex, full match); may be repeated
        #[arg(long = "exclude", value_name = "REGEX")]
        exclude: Vec<String>,
        /// Pause every scan after this many milliseconds, then resume it
        #[arg(long)]
        pause_after_ms: Option<u64>,
        /// Only print the summary
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(long, value_enum, default_value = "toml")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Toml,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Safe,
    Protect,
    Standard,
    Attack,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Safe => Mode::Safe,
            ModeArg::Protect => Mode::Protect,
            ModeArg::Standard => Mode::Standard,
            ModeArg::Attack => Mode::Attack,
        }
    }
}

/// Render `config` in the requested format.
pub fn render_config(
    config: &RampartConfig,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Toml => toml::to_string_pretty(config)
            .context("failed to render configuration as TOML"),
        OutputFormat::Json => serde_json::to_string_pretty(config)
            .context("failed to render configuration as JSON"),
    }
}

/// Execute `command` against an already loaded configuration.
pub async fn run(
    command: Command,
    config: RampartConfig,
    source: &ConfigSource,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Config {
            action: ConfigAction::Show { format },
        } => {
            writeln!(out, "# source: {source}")?;
            write!(out, "{}", render_config(&config, format)?)?;
            if matches!(format, OutputFormat::Json) {
                writeln!(out)?;
            }
        }
        Command::Simulate {
            mode,
            hosts,
            depth,
            fanout,
            latency_ms,
            exclude,
            pause_after_ms,
            quiet,
        } => {
            let options = SimulateOptions {
                mode: mode.map(Mode::from),
                hosts,
                depth,
                fanout,
                latency: Duration::from_millis(latency_ms),
                exclude,
                pause_after: pause_after_ms.map(Duration::from_millis),
            };
            let report = simulate(config.orchestrator, options).await?;
            report.write_to(out, !quiet)?;
        }
    }
    Ok(())
}
