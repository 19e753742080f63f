//! Herald CLI
//!
//! Local execution entry point for the announcement bot.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use herald::{
    error::Result,
    metrics,
    models::Config,
    pipeline::{self, IngestPipeline, Scheduler},
    services::{ChicagoDataClient, LicenseSource},
    storage::FileWatermarkStore,
    utils::log::{self as logging, LogLevel},
};

/// Herald - New Restaurant Announcer
#[derive(Parser, Debug)]
#[command(
    name = "herald",
    version,
    about = "Announces newly licensed Chicago restaurants on Bluesky"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "HERALD_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check for new licenses on a schedule until interrupted
    Run,

    /// Run a single ingest cycle and print its summary
    Once,

    /// Show what would be posted for recent licenses, without posting
    Preview {
        /// How many days back to look (default: schedule.lookback_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Validate configuration
    Validate,

    /// Show configured paths and the persisted watermark
    Info,
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, found) = Config::load_or_default(&cli.config)?;
    config.apply_env();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::parse(&config.monitoring.log_level)
    };
    logging::init(level, config.monitoring.log_file.as_deref())?;

    log::info!("Herald starting...");
    if found {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!(
            "Config file {} not found. Using defaults.",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Run => {
            config.validate()?;
            if config.monitoring.enable_metrics {
                metrics::init_exporter(config.monitoring.metrics_port)?;
            }

            let pipeline = IngestPipeline::from_config(&config).await?;
            let scheduler = Scheduler::from_config(pipeline, &config.schedule);

            tokio::select! {
                _ = scheduler.run() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Shutting down...");
                }
            }
        }

        Command::Once => {
            config.validate()?;
            let mut pipeline = IngestPipeline::from_config(&config).await?;
            let summary = pipeline.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Preview { days } => {
            config.validate_source()?;
            let days = days.unwrap_or(config.schedule.lookback_days);
            let since = Utc::now() - Duration::days(i64::from(days));

            let source = ChicagoDataClient::new(&config.source)?;
            let records = source.fetch_since(since).await?;
            log::info!("Found {} licenses in the last {days} days", records.len());

            let render = config.render_config();
            for (i, record) in records.iter().enumerate() {
                let text = pipeline::render(record, &render);
                let verdict = match pipeline::check(record, &config.filters) {
                    Ok(()) => "would post".to_string(),
                    Err(reason) => format!("would skip ({reason})"),
                };

                println!("─── {}/{} ───", i + 1, records.len());
                println!("Name:       {}", record.name);
                println!("Address:    {} {}", record.address, record.zip_code);
                println!("License:    {}", record.license_description);
                println!("Issued:     {}", record.issued_at);
                println!("Ward:       {}", record.ward().unwrap_or("-"));
                println!("Verdict:    {verdict}");
                println!("Characters: {}", text.chars().count());
                println!();
                println!("{text}");
                println!();
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Config file: {}", cli.config.display());
            match ChicagoDataClient::new(&config.source) {
                Ok(source) => log::info!("Dataset: {}", source.endpoint()),
                Err(e) => log::warn!("Dataset URL invalid: {e}"),
            }
            log::info!("Bluesky handle: {}", config.bluesky.handle);
            log::info!(
                "Check interval: {} minutes",
                config.schedule.check_interval_minutes
            );

            let store = FileWatermarkStore::new(&config.storage.timestamp_file);
            log::info!("Watermark file: {}", store.path().display());
            match store.read().await {
                Ok(Some(ts)) => log::info!("Last check: {}", ts.to_rfc3339()),
                Ok(None) => log::info!("No watermark saved yet."),
                Err(e) => log::warn!("Watermark unreadable: {e}"),
            }
        }
    }

    Ok(())
}
