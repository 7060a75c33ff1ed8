//! cdr-alarmd - CDR alarm daemon
//!
//! Runs the alarm tick and the daily CDR report on a fixed interval over a
//! JSON dataset, and checks dialled destinations against the prefix lists.

mod dataset;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cdr_alarms::{Engine, LogDispatcher, MemoryRunLock, start_engine_task};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dataset::Dataset;

#[derive(Parser, Debug)]
#[command(name = "cdr-alarmd")]
#[command(about = "CDR alarm daemon")]
#[command(version)]
struct Cli {
    /// Path to the dataset file.
    #[arg(short, long, env = "CDR_ALARMD_DATA", default_value = "cdr-alarmd.json")]
    data: PathBuf,

    /// Extra administrator recipient (repeatable).
    #[arg(long = "admin", env = "CDR_ALARMD_ADMINS", value_delimiter = ',')]
    admins: Vec<String>,

    /// Extra daily report recipient (repeatable).
    #[arg(long = "report-to", env = "CDR_ALARMD_REPORT_TO", value_delimiter = ',')]
    report_to: Vec<String>,

    /// Emit logs as JSON.
    #[arg(long, env = "CDR_ALARMD_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tick periodically until interrupted
    Run {
        /// Seconds between ticks (defaults to the dataset setting)
        #[arg(long, env = "CDR_ALARMD_INTERVAL_SECS")]
        interval_secs: Option<u64>,
    },

    /// Run a single tick and print its summary
    Tick {
        /// Evaluation instant, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Check destinations against the prefix lists
    Prefix {
        /// Dialled destinations
        #[arg(required = true)]
        destinations: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Run { interval_secs } => {
            let interval = interval_secs
                .map_or_else(|| engine.config().tick_interval(), Duration::from_secs);
            run_loop(engine, interval).await?;
        }

        Commands::Tick { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let tick = tokio::task::spawn_blocking(move || engine.run_once(now)).await?;
            let alarms = tick.alarms.context("alarm tick failed")?;
            println!("{}", serde_json::to_string_pretty(&alarms)?);
            tick.report.context("daily report failed")?;
        }

        Commands::Prefix { destinations } => {
            let now = Utc::now();
            for destination in destinations {
                match engine.prefixes().observe(&destination, now) {
                    Some((list, sent)) => println!("{destination}: {list} (notice sent: {sent})"),
                    None => println!("{destination}: no match"),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
    }
}

fn build_engine(cli: &Cli) -> anyhow::Result<Arc<Engine>> {
    let data = Dataset::load(&cli.data)?.into_stores()?;

    let mut config = data.config;
    config.admin_recipients.extend(cli.admins.iter().cloned());
    config.report_recipients.extend(cli.report_to.iter().cloned());

    info!(
        data = %cli.data.display(),
        admins = config.admin_recipients.len(),
        report_recipients = config.report_recipients.len(),
        "starting cdr-alarmd"
    );

    Ok(Arc::new(Engine::new(
        config,
        Arc::new(data.cdrs),
        Arc::new(data.alarms),
        Arc::new(LogDispatcher::default()),
        Arc::new(MemoryRunLock::new()),
    )))
}

async fn run_loop(engine: Arc<Engine>, interval: Duration) -> anyhow::Result<()> {
    anyhow::ensure!(!interval.is_zero(), "tick interval must be positive");

    let handle = start_engine_task(engine, interval);
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!(ticks = handle.ticks(), "shutting down");
    handle.shutdown().await;
    Ok(())
}
