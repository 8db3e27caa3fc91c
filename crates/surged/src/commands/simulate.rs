//! `surged simulate` — run the balancer against synthetic traffic.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use surge_core::{ShrinkPolicy, SurgeConfig};
use surge_dispatch::{FinalReport, LoadBalancer, RunBudget};
use surge_loadgen::LoadGenerator;

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Path to a surge.toml. Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pool floor (overrides [dispatch].min_servers).
    #[arg(long)]
    pub min_servers: Option<usize>,

    /// Pool ceiling (overrides [dispatch].max_servers).
    #[arg(long)]
    pub max_servers: Option<usize>,

    /// Queue depth above which the pool grows.
    #[arg(long)]
    pub threshold_high: Option<usize>,

    /// Queue depth below which the pool shrinks.
    #[arg(long)]
    pub threshold_low: Option<usize>,

    /// Backlog handling for stopped workers: abandon or drain.
    #[arg(long)]
    pub shrink_policy: Option<ShrinkPolicy>,

    /// Run length in clock cycles (milliseconds).
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Fixed RNG seed for reproducible traffic.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Report output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl SimulateArgs {
    /// Load the config file (or defaults) and apply flag overrides.
    pub fn resolve(&self) -> anyhow::Result<SurgeConfig> {
        let mut config = match &self.config {
            Some(path) => SurgeConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SurgeConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut SurgeConfig) {
        if let Some(v) = self.min_servers {
            config.dispatch.min_servers = v;
        }
        if let Some(v) = self.max_servers {
            config.dispatch.max_servers = v;
        }
        if let Some(v) = self.threshold_high {
            config.dispatch.threshold_high = v;
        }
        if let Some(v) = self.threshold_low {
            config.dispatch.threshold_low = v;
        }
        if let Some(v) = self.shrink_policy {
            config.dispatch.shrink_policy = v;
        }
        if let Some(v) = self.cycles {
            config.simulation.cycles = v;
        }
        if let Some(v) = self.seed {
            config.load.seed = Some(v);
        }
    }
}

pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let cycles = config.simulation.cycles;
    info!(
        cycles,
        shrink_policy = %config.dispatch.shrink_policy,
        "surge simulation starting"
    );

    let generator = LoadGenerator::new(config.load.clone())?;
    let balancer = LoadBalancer::start(config.dispatch.clone())?;

    let report = tokio::select! {
        report = balancer.run_for(RunBudget::Cycles(cycles), generator) => report?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing Ctrl-C handler")?;
            info!("shutdown signal received, stopping early");
            balancer.stop().await?
        }
    };

    print_report(&report, args.format)
}

fn print_report(report: &FinalReport, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Text => println!("{report}"),
    }
    Ok(())
}
