use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use cropscan::classifier::HttpClassifier;
use cropscan::config;
use cropscan::connectivity::HttpProbe;
use cropscan::db;
use cropscan::history::HttpHistoryArchive;
use cropscan::sync::SyncManager;

#[derive(Debug, Parser)]
#[command(author, version, about = "Run exactly one sync pass and exit")]
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

    let manager = SyncManager::new(
        pool,
        Arc::new(classifier),
        Arc::new(archive),
        Arc::new(probe),
        cfg.app.max_retries,
    );

    let result = manager.sync_pending_tasks().await;
    info!(
        succeeded = result.succeeded,
        synced = result.synced_count,
        "{}",
        result.message
    );
    Ok(())
}
