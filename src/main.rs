//! MemoDB admin tool
//!
//! Inspects and maintains a memo database file: dump its contents, reset
//! operations, purge expired rows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memodb::{
    spawn_purge_task, BincodeCodec, Codec, DurableStore, JsonCodec, MemoConfig, Memoizer,
    OperationId, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "memodb", version, about = "Inspect and maintain a memo database")]
struct Cli {
    /// Database file (defaults to MEMO_STORE_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Codec the blobs were written with
    #[arg(long, value_enum, default_value_t = CodecKind::Json)]
    codec: CodecKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecKind {
    Json,
    Bincode,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every stored record
    Dump {
        /// Emit JSON instead of `operation;expires_at;args;result` lines
        #[arg(long)]
        json: bool,
    },
    /// Delete the records of one operation, or of all operations
    Reset {
        /// Operation name; omit to reset everything
        operation: Option<String>,
    },
    /// Delete expired records
    Purge {
        /// Keep running, purging at this interval in seconds until interrupted
        /// (defaults to MEMO_PURGE_INTERVAL_SECS; one pass when neither is set)
        #[arg(long)]
        every: Option<u64>,
    },
}

/// Main entry point for the MemoDB admin tool.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables, apply CLI overrides
/// 3. Open the durable store (required here, unlike in the library)
/// 4. Run the requested command
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memodb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = MemoConfig::from_env();
    if let Some(db) = cli.db {
        config = config.set_store_path(db);
    }
    let Some(path) = config.store_path.clone() else {
        bail!("no database given: pass --db or set MEMO_STORE_PATH");
    };
    let store = DurableStore::open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    info!("Using memo database {}", path.display());

    let clock = Arc::new(SystemClock);
    match cli.codec {
        CodecKind::Json => {
            run(Memoizer::from_parts(config, JsonCodec, store, clock), cli.command).await
        }
        CodecKind::Bincode => {
            run(Memoizer::from_parts(config, BincodeCodec, store, clock), cli.command).await
        }
    }
}

async fn run<C: Codec>(memo: Memoizer<C>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Dump { json } => {
            let snapshot = memo.dump_state()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                for entry in &snapshot.durable {
                    println!("{}", entry);
                }
            }
        }
        Command::Reset { operation: Some(name) } => {
            memo.reset(&OperationId::new(name))?;
        }
        Command::Reset { operation: None } => {
            memo.reset_all()?;
        }
        Command::Purge { every } => {
            if every == Some(0) {
                bail!("--every must be at least 1 second");
            }
            let interval = every
                .map(Duration::from_secs)
                .or(memo.config().purge_interval);
            match interval {
                None => {
                    let removed = memo.purge_expired()?;
                    println!("{} expired records removed", removed);
                }
                Some(interval) => {
                    let handle = spawn_purge_task(memo, interval);
                    shutdown_signal().await;
                    handle.abort();
                    warn!("Purge task aborted");
                }
            }
        }
    }
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
