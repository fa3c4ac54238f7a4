//! vehicle-lister - browse a vehicle parts catalog by brand, chassis and
//! engine, offline-first.
//!
//! Each session samples a few cars from the remote catalog into the local
//! store, then serves every list from the store so browsing keeps working
//! without a connection.

mod commands;
mod session;

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vehicle_lister_core::remote::{FirestoreClient, HttpAssetFetcher};
use vehicle_lister_core::{
    ChassisSummaryCache, Config, ConnectivityMonitor, FileStore, LocalStore, SyncPopulator, TierLoader,
};

use commands::Command;
use session::{Flow, Session};

/// How often the background watcher re-checks connectivity
const RECHECK_INTERVAL: Duration = Duration::from_secs(30);

const LOG_FILE_PREFIX: &str = "vehicle-lister.log";

/// Initialize tracing into a daily log file so the shell output stays clean.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=vehicle_lister_core=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    guard
}

fn print_flush(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let log_dir = config.log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;
    let _log_guard = init_tracing(&log_dir);
    info!("vehicle-lister starting");

    // --ephemeral keeps the catalog in memory for this session only
    let ephemeral = std::env::args().skip(1).any(|arg| arg == "--ephemeral");
    let store: Arc<dyn LocalStore> = if ephemeral {
        info!("Using an in-memory store");
        Arc::new(FileStore::in_memory())
    } else {
        let store_dir = config.store_dir()?;
        Arc::new(
            FileStore::open(&store_dir)
                .await
                .with_context(|| format!("Failed to open local store at {}", store_dir.display()))?,
        )
    };
    let remote = Arc::new(FirestoreClient::new(&config.remote)?);
    let assets = Arc::new(HttpAssetFetcher::new(&config.remote)?);
    let cache = Arc::new(ChassisSummaryCache::new(
        config.summary_cache_dir()?,
        config.summary_cache_ttl_minutes,
    )?);

    let timeout = config.remote.request_timeout();
    let check_url = config.remote.firestore_base_url.clone();
    let monitor = ConnectivityMonitor::new(ConnectivityMonitor::check(&check_url, timeout).await);
    let _watcher = monitor.spawn_watcher(check_url, RECHECK_INTERVAL, timeout);

    // Surface transitions in the shell; the first value is the current state
    let mut transitions = Box::pin(monitor.subscribe().skip(1));
    tokio::spawn(async move {
        while let Some(online) = transitions.next().await {
            let state = if online { "online" } else { "offline" };
            print_flush(&format!("\n[connectivity: {}]\n", state));
        }
    });

    let sync = SyncPopulator::new(
        store.clone(),
        remote.clone(),
        assets,
        monitor.clone(),
        config.sync.clone(),
        timeout,
    )
    .with_cache(cache.clone());
    let loader = TierLoader::new(store)
        .with_cache(cache)
        .with_remote(remote, monitor.clone(), timeout);
    let mut session = Session::new(sync, loader, monitor);

    let mut out = String::new();
    session.sync(&mut out).await?;
    out.push_str("Type 'help' for commands.\n");
    print_flush(&out);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_flush("> ");
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                print_flush(&format!("error: {}\n", e));
                continue;
            }
        };

        let mut out = String::new();
        match session.execute(command, &mut out).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => print_flush(&out),
            Err(e) => {
                warn!(error = %e, "Command failed");
                print_flush(&out);
                print_flush(&format!("error: {:#}\n", e));
            }
        }
    }

    info!("vehicle-lister shutting down");
    Ok(())
}
