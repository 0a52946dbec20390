//! Frog Pool Server
//!
//! Realtime pool game: players pay to activate a frog, keep it fed and race
//! to catch a big prize that moves between the frogs of a full pool.

mod api;
mod app;
mod config;
mod server;
mod shutdown;
mod state;

use app::App;
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use frogpool_core::chain::SolanaRpcGateway;
use frogpool_core::framework::DatabaseProcessor;
use frogpool_core::store::{GameStore, MemoryGameStore, PgGameStore};
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Frog Pool - realtime pool game server
#[derive(Parser, Debug)]
#[command(name = "frogpool-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./frogpool-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep all state in memory instead of Postgres (lost on exit)
    #[arg(long, default_value = "false")]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting frogpool-server v{}", env!("CARGO_PKG_VERSION"));

    let loaded_config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    let listen_addr = loaded_config.server.listen;
    tracing::info!(
        network = %loaded_config.chain.network,
        rpc = %loaded_config.chain.rpc_url,
        "Configuration loaded from {:?}",
        args.config
    );

    let (store, db_pool) = if args.ephemeral {
        tracing::warn!("Running with the in-memory store, state is lost on exit");
        let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
        (store, None)
    } else {
        let database_url = get_database_url().map_err(|e| {
            tracing::error!("DATABASE_URL environment variable not set");
            e
        })?;

        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        if args.migrate {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("../migrations")
                .run(&db_pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    e
                })?;
            tracing::info!("Migrations completed successfully");
        }

        let processor = DatabaseProcessor {
            pool: db_pool.clone(),
        };
        let store: Arc<dyn GameStore> = Arc::new(PgGameStore::new(processor));
        (store, Some(db_pool))
    };

    let treasury_address = loaded_config.chain.treasury_address.clone();
    let chain = Arc::new(SolanaRpcGateway::new(loaded_config.chain)?);

    let App {
        state,
        registry,
        scheduler,
        decay_worker,
    } = App::assemble(
        store,
        chain,
        treasury_address,
        loaded_config.auth,
        loaded_config.game,
    )
    .await;

    let resumed = scheduler.resume_active_pools().await?;
    tracing::info!(pools = resumed, "Resumed prize tasks of active pools");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let decay_handle = tokio::spawn(decay_worker.run(shutdown_rx));

    let router = build_router(state);

    // Upgraded WebSocket connections are closed here so the graceful
    // shutdown does not wait on them.
    let shutdown = {
        let registry = registry.clone();
        let scheduler = scheduler.clone();
        async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
            scheduler.stop_all().await;
            registry.close_all().await;
        }
    };

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown).await;

    if let Err(e) = decay_handle.await {
        tracing::error!(error = %e, "Hunger decay worker panicked");
    }
    scheduler.stop_all().await;

    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
