use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use std::path::{Path, PathBuf};

use cropscan::config;
use cropscan::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "Queue a captured image for sync")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Image file to enqueue
    image: PathBuf,
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let payload_data = format!(
        "data:{};base64,{}",
        mime_for(&args.image),
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    let payload_name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "capture".to_string());

    let id = db::enqueue_task(&pool, &payload_name, &payload_data).await?;
    println!("Queued {} as task {}", payload_name, id);
    Ok(())
}
