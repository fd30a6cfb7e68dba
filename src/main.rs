use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cropscan::classifier::HttpClassifier;
use cropscan::config;
use cropscan::connectivity::{Connectivity, HttpProbe};
use cropscan::db;
use cropscan::history::HttpHistoryArchive;
use cropscan::sync::SyncManager;

#[derive(Debug, Parser)]
#[command(author, version, about = "Offline scan queue sync agent")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let classifier = HttpClassifier::new(
        &cfg.classifier.endpoint,
        cfg.classifier.api_key.clone(),
        cfg.classifier.model.clone(),
    )?;
    let archive = HttpHistoryArchive::new(&cfg.history.endpoint, cfg.history.api_key.clone())?;
    let probe = HttpProbe::new(&cfg.connectivity.probe_url)?;

    let manager = Arc::new(SyncManager::new(
        pool.clone(),
        Arc::new(classifier),
        Arc::new(archive),
        Arc::new(probe.clone()),
        cfg.app.max_retries,
    ));

    let _unsubscribe = manager.on_sync_complete(|result| {
        if result.succeeded {
            info!(synced = result.synced_count, "{}", result.message);
        } else {
            warn!("sync pass did not complete: {}", result.message);
        }
    });

    info!("starting scan sync agent");

    // Trigger passes on each offline -> online transition. The manager's
    // single-flight guard makes this safe alongside manual sync_once runs.
    let interval = Duration::from_secs(cfg.app.probe_interval_secs);
    let mut was_online = false;
    loop {
        let online = probe.is_online().await;
        if online && !was_online {
            info!("connectivity restored; draining scan queue");
            manager.sync_pending_tasks().await;
        }
        was_online = online;
        tokio::time::sleep(interval).await;
    }
}
