use anyhow::Context;
use chia_block_sync::{cancel::CancelToken, config::Settings, daemon, SqliteStore, Store};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "chia-block-sync")]
#[command(version, about = "Sync Chia blocks and count them per farmer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync blocks until interrupted
    Run {
        /// Config file (json format)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the farmers with the most blocks
    Farmers {
        /// Config file (json format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only count blocks of this UTC day (YYYY-MM-DD)
        #[arg(short, long)]
        day: Option<NaiveDate>,

        /// Number of farmers to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Farmers { config, day, limit } => farmers(config, day, limit).await,
    }
}

async fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = Settings::load(config.as_deref())?;
    let store = SqliteStore::new(&settings.db_path)?;

    let cancel = CancelToken::new();
    let (handle, mut startup) = daemon::spawn(&settings, store, cancel.clone());

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for interrupt signal")?;
            info!("got interrupt signal, aborting...");
            cancel.cancel();
            handle.await.context("sync task panicked")?;
        }
        exited = &mut startup => {
            if let Ok(e) = exited {
                return Err(e).context("sync could not start");
            }
            handle.await.context("sync task panicked")?;
        }
    }
    Ok(())
}

async fn farmers(
    config: Option<PathBuf>,
    day: Option<NaiveDate>,
    limit: usize,
) -> anyhow::Result<()> {
    let settings = Settings::load(config.as_deref())?;
    let store = SqliteStore::new(&settings.db_path)?;

    match store.load_watermark().await? {
        Some(height) => println!("synced height: {height}"),
        None => println!("synced height: none"),
    }

    let rows = match day {
        Some(day) => store.daily_top_farmers(day, limit).await?,
        None => store.top_farmers(limit).await?,
    };
    for (rank, (address, count)) in rows.iter().enumerate() {
        println!("{:>4}  {}  {}", rank + 1, address, count);
    }
    Ok(())
}
