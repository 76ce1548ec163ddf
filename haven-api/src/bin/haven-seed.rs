//! haven-seed - writes the initial house layout when the store has no houses

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use haven_api::{kv::KvStore, seed};
use haven_core::{facility, Repository};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "haven-seed")]
#[command(about = "Initializes houses from a YAML layout when none exist")]
struct Args {
    /// YAML file with the house layout
    #[arg(long, env = "HAVEN_LAYOUT", default_value = "haven-api/config/houses.yaml")]
    layout: PathBuf,

    /// NATS server URL
    #[arg(long, env, default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Path to NATS credentials file
    #[arg(long, env)]
    nats_creds_path: Option<String>,

    /// JetStream KV bucket holding all documents
    #[arg(long, env = "HAVEN_KV_BUCKET", default_value = "haven")]
    kv_bucket: String,

    /// Validate the layout without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let houses = seed::load_layout(&args.layout)?;
    info!(
        "Loaded {} houses from {}",
        houses.len(),
        args.layout.display()
    );
    if args.dry_run {
        info!("Dry-run: layout is valid, nothing written");
        return Ok(());
    }

    let store = KvStore::connect(&args.nats_url, args.nats_creds_path.as_deref(), &args.kv_bucket).await?;
    let repo = Repository::new(Arc::new(store));
    let written = facility::seed_houses(&repo, &houses).await?;
    info!("Seeding finished: {} houses written", written);
    Ok(())
}
