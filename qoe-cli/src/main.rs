mod cli;
mod config;
mod error;
mod output;
mod replay;
mod script;

use std::process;

use clap::Parser;
use qoe_agent::logging::{DEFAULT_LOG_FILTER, LoggingOptions, VERBOSE_LOG_FILTER, init_logging};
use tracing::{error, info};

use crate::cli::{Args, Commands};
use crate::error::Result;
use crate::replay::ReplayOptions;
use crate::script::Script;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_cli_logging(&args)?;
    let config = config::load(args.config.as_deref())?;

    match args.command {
        Commands::Replay {
            script,
            endpoint,
            realtime,
            output,
        } => {
            let raw = std::fs::read_to_string(&script)?;
            let script = Script::from_json_str(&raw)?;
            info!(player = %script.player, steps = script.steps.len(), "Replaying script");

            let outcome = replay::run(
                config,
                script,
                ReplayOptions {
                    endpoint,
                    realtime,
                    verbose: args.verbose,
                },
            )
            .await?;

            if let Some(requests) = &outcome.requests {
                print!("{}", output::format_requests(requests, output)?);
            }
            if output == cli::OutputFormat::Pretty {
                print!(
                    "{}",
                    output::format_stats(&outcome.stats, outcome.session_id.as_deref())
                );
            }
        }
        Commands::Tags => print!("{}", output::format_tags()),
        Commands::Config => print!("{}", config::show(&config)?),
    }
    Ok(())
}

fn init_cli_logging(args: &Args) -> Result<()> {
    let filter = if args.quiet {
        Some("error".to_string())
    } else if std::env::var_os("RUST_LOG").is_some() {
        None
    } else {
        Some(format!("{DEFAULT_LOG_FILTER},qoe=info"))
    };
    let logging = init_logging(LoggingOptions {
        json: args.json_logs,
        filter,
    })?;
    if args.verbose {
        logging.set_filter(&format!("{VERBOSE_LOG_FILTER},qoe=debug"))?;
    }
    Ok(())
}
