use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cropscan::config;
use cropscan::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect the local scan queue")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Remove permanently failed scans from the queue
    #[arg(long)]
    clear_failed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    if args.clear_failed {
        let removed = db::clear_failed(&pool).await?;
        println!("Cleared {} failed scan(s)", removed);
    }

    match db::get_last_sync_at(&pool).await? {
        Some(at) => println!("Last sync: {}", at.to_rfc3339()),
        None => println!("Last sync: never"),
    }
    println!(
        "Pending: {}  Failed: {}",
        db::count_pending(&pool).await?,
        db::count_failed(&pool).await?
    );

    let tasks = db::list_all_tasks(&pool).await?;
    for task in tasks {
        println!(
            "  {} [{}] {} (retries: {}, captured {})",
            task.id,
            task.status.as_str(),
            task.payload_name,
            task.retry_count,
            task.created_at.to_rfc3339()
        );
    }
    Ok(())
}
