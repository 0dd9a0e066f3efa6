use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use kgprice_watcher::config::{AppConfig, RendererBackend};
use kgprice_watcher::scheduler::RefreshScheduler;
use kgprice_watcher::startup;
use kgprice_watcher::PriceExtractor;

#[derive(Debug, Parser)]
#[command(name = "kgprice-watcher", version, about = "Keeps per-kilogram prices in a spreadsheet up to date")]
struct Cli {
    /// Configuration file (defaults to config/default, config/$RUN_MODE, config/local)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Page rendering backend
    #[arg(long, value_enum, global = true)]
    backend: Option<RendererBackend>,

    /// Pause between product pages, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh every product row once and rewrite the sheet
    Run,
    /// Refresh on the configured cron schedule until interrupted
    Watch,
    /// Render one product page and print its unit price
    Probe { url: String },
    /// Extract a unit price from a literal label text
    Extract { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.refresh.backend = backend;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.refresh.delay_ms = delay_ms;
    }
    config.check()?;

    let _log_guard = startup::init_tracing(&config.logging)?;
    info!("Starting kgprice-watcher...");

    match cli.command {
        Command::Run => {
            let refresher = startup::build_refresher(&config)?;
            let store = startup::build_sheet_store(&config)?;
            let summary = refresher.refresh_sheet(store.as_ref()).await?;
            println!(
                "{} rows: {} prices, {} errors, {} skipped ({} ms)",
                summary.rows, summary.found, summary.failed, summary.skipped, summary.total_time_ms
            );
        }
        Command::Watch => {
            let refresher = Arc::new(startup::build_refresher(&config)?);
            let store = startup::build_sheet_store(&config)?;
            let mut scheduler =
                RefreshScheduler::new(refresher, store, config.scheduler.clone()).await?;

            scheduler.start().await?;
            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;

            let stats = scheduler.stats().await;
            info!(
                runs = stats.run_count,
                succeeded = stats.success_count,
                failed = stats.error_count,
                skipped_ticks = stats.skipped_ticks,
                "Watch finished"
            );
        }
        Command::Probe { url } => {
            let refresher = startup::build_refresher(&config)?;
            let price = refresher.scrape_one(&url).await;
            println!("{}", price);
        }
        Command::Extract { text } => {
            let extractor = PriceExtractor::with_strategy(config.refresh.digit_strategy);
            println!("{}", extractor.extract(&text));
        }
    }

    Ok(())
}
