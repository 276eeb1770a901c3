use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "qoe",
    author,
    version,
    about = "Replay scripted player sessions through the QoE agent",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Agent configuration file (TOML). Defaults plus `QOE_*` variables when omitted.
    #[arg(short, long, global = true, env = "QOE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging, including per-event delivery traces
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a tracker with a JSON script of player actions
    Replay {
        /// Script file
        script: PathBuf,

        /// Collector URL. Batches are captured in memory and printed when omitted.
        #[arg(short, long)]
        endpoint: Option<Url>,

        /// Honour script waits in wall-clock time instead of advancing a manual clock
        #[arg(long)]
        realtime: bool,

        /// Output format for captured batches
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// List public session tag names and the wire fields they map to
    Tags,

    /// Print the effective agent configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per event
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Compact JSON, one batch per line
    JsonCompact,
}
