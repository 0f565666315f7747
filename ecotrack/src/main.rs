//! EcoTrack - personal carbon footprint tracker

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecotrack::{config::Args, execute_command};
use footprint_engine::Calculator;
use footprint_ledger::{EntryService, EntryStore, MemoryStore, MongoStore};

fn init_tracing(args: &Args) {
    let log_level = args.log_level.to_lowercase();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "ecotrack={0},footprint_engine={0},footprint_ledger={0},info",
            log_level
        )
        .into()
    });

    // stdout carries command output
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn connect_store(args: &Args) -> Option<Arc<dyn EntryStore>> {
    if args.offline {
        info!("Offline mode, entries kept in memory");
        return Some(Arc::new(MemoryStore::new()));
    }
    if !args.needs_store() {
        return None;
    }

    match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(store) => {
            info!("MongoDB connected successfully");
            Some(Arc::new(store.with_transactions(args.mongodb_transactions)))
        }
        Err(e) => {
            warn!("MongoDB connection failed (continuing without storage): {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let factors = args.factor_table()?;
    let mut service = EntryService::new(Calculator::new(factors));
    if let Some(store) = connect_store(&args).await {
        service = service.with_store(store);
    }

    let output = execute_command(&service, args.command).await?;
    println!("{}", output);

    Ok(())
}
