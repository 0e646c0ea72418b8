//! Exchange Engine Binary
//!
//! Boots the exchange core: opens the store, rebuilds the in-memory
//! books, starts one matching engine per registry symbol plus the
//! expiration scheduler, then waits for shutdown. Client surfaces
//! (HTTP adaptors, agents) live outside this process and call the
//! router's `submit` / `cancel` / `snapshot` operations.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin exchange-engine
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: Turso database path (default: exchange.db)
//! - `EXCHANGE_SYMBOLS`: symbols to provision at bootstrap
//! - `PER_SYMBOL_QUEUE_CAPACITY`: intent queue depth (default: 1024)
//! - `EXPIRATION_TICK_SECONDS`: scheduler period (default: 1)
//! - `MARKET_ORDER_SLIPPAGE_CUSHION`: market-buy reserve pad (default: 1.10)
//! - `DB_MAX_RETRIES` / `DB_RETRY_BASE_MS` / `DB_RETRY_MAX_MS`: retry knobs
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;

use exchange_engine::config::EngineConfig;
use exchange_engine::engine::{ExpirationScheduler, recover_engines};
use exchange_engine::store::{Sequencer, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }

    // Initialize tracing
    // Static directive strings are guaranteed to parse successfully
    #[allow(clippy::unwrap_used)]
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("exchange_engine=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting Exchange Engine");

    let config = EngineConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        queue_capacity = config.per_symbol_queue_capacity,
        expiration_tick_secs = config.expiration_tick.as_secs(),
        "Configuration loaded"
    );

    let store = Arc::new(Store::open(&config.database_url).await?);

    // Provision configured symbols into the registry (idempotent);
    // everything else is created out-of-band.
    let sequencer = Sequencer::new();
    for symbol in &config.symbols {
        sequencer.ensure_symbol(&store, symbol).await?;
    }

    let router = Arc::new(
        recover_engines(
            Arc::clone(&store),
            config.per_symbol_queue_capacity,
            config.retry,
            config.slippage_cushion,
        )
        .await?,
    );
    tracing::info!(symbols = router.symbols().len(), "Books recovered, engines running");

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = ExpirationScheduler::new(
        Arc::clone(&store),
        Arc::clone(&router),
        config.expiration_tick,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    tracing::info!("Exchange engine ready");

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    if let Err(err) = scheduler_handle.await {
        tracing::warn!(%err, "Scheduler task join failed");
    }
    match Arc::try_unwrap(router) {
        Ok(router) => router.shutdown().await,
        Err(_) => tracing::warn!("Router still shared at shutdown; engines stop with the process"),
    }

    tracing::info!("Exchange engine stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
