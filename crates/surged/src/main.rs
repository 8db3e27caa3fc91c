//! surged — the surge simulation daemon.
//!
//! Assembles the dispatch engine and the synthetic load generator:
//! - Configuration (surge.toml + flag overrides)
//! - Load balancer (admission queue, autoscaled worker pool)
//! - Load generator (random batches every interval)
//!
//! # Usage
//!
//! ```text
//! surged simulate --config surge.toml --cycles 10000
//! surged init > surge.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "surged",
    about = "surge — autoscaling request dispatcher simulation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a time-boxed simulation with synthetic traffic.
    Simulate(commands::simulate::SimulateArgs),
    /// Print a scaffold surge.toml holding every default.
    Init {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::Simulate(args) => commands::simulate::run(args).await,
        Command::Init { output } => commands::init::run(output.as_deref()),
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,surge=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
