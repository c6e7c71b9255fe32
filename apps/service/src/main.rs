#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use logger::{LevelFilter, LogFormat};
use tokio::sync::watch;
use tracing::{info, warn};

use uppe_checks::config::Config;
use uppe_checks::error::AppError;
use uppe_checks::monitoring::{Capabilities, HttpChecker, MonitoringExecutor, MonitoringScheduler};
use uppe_checks::notify::{LogNotifier, Notifier, SmsNotifier};
use uppe_checks::store::{FileStore, RecordStore};

#[derive(Parser)]
#[command(name = "uppe-checks", version, about = "Uptime check worker")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `store.data_dir`.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run a single sweep, wait for every probe, then exit.
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let format = config.logging.format.parse::<LogFormat>().map_err(AppError::LogFormat)?;
    logger::init_with(LevelFilter::INFO, Some(format));

    let scheduler = build_scheduler(&config).await?;

    if cli.once {
        let sweep = scheduler.sweep().await;
        info!(dispatched = sweep.dispatched(), "Single sweep dispatched");
        sweep.join().await;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Could not listen for Ctrl-C");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    info!("Worker stopped");
    Ok(())
}

async fn build_scheduler(config: &Config) -> Result<MonitoringScheduler, AppError> {
    info!(environment = %config.environment, "Starting uptime check worker");

    let store = FileStore::new(&config.store.data_dir);
    store.initialize().await?;
    info!(data_dir = %store.base_dir().display(), "Record store ready");
    let store: Arc<dyn RecordStore> = Arc::new(store);

    let notifier: Arc<dyn Notifier> = match &config.sms {
        Some(settings) => {
            info!(from = %settings.from_phone, "Alerts delivered by SMS");
            Arc::new(SmsNotifier::new(settings.clone())?)
        }
        None => {
            warn!("No SMS settings configured, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let executor = MonitoringExecutor::new(Capabilities {
        store,
        checker: Arc::new(HttpChecker::new()?),
        notifier,
    });

    Ok(MonitoringScheduler::new(
        Arc::new(executor),
        config.sweep_interval(),
        config.scheduler.dedupe_in_flight,
    ))
}
