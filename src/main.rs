//! IronMUD Game Server
//!
//! A line-mode multiplayer dungeon server: plain TCP, one connection per
//! player, classic terminal clients welcome.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ironmud::config::ServerConfig;
use ironmud::game::engine::Engine;
use ironmud::net::handler::SessionHandler;
use ironmud::net::manager::ConnectionManager;
use ironmud::persistence::{
    CharacterRepository, MemoryCharacterRepository, MemoryPlayerRepository, PgCharacterRepository,
    PgPlayerRepository, PlayerRepository,
};
use ironmud::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("IronMUD server v{}", VERSION);

    // Load configuration
    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    // Pick repositories: PostgreSQL when reachable, in-memory otherwise
    let (players, characters) = create_repositories(&config).await;

    // Wire up the engine, the session driver, and the connection manager
    let engine = Arc::new(Engine::new(Arc::clone(&characters)));
    let handler = Arc::new(SessionHandler::new(players, characters, engine));
    let manager = Arc::new(ConnectionManager::with_cleanup_interval(
        handler,
        config.max_clients,
        config.idle_timeout(),
        config.cleanup_interval(),
    ));

    // Start accepting connections
    let address = config.listen_addr();
    let accept_manager = Arc::clone(&manager);
    let accept_handle = tokio::spawn(async move {
        if let Err(e) = accept_manager.start(&address).await {
            error!(error = %e, "Server terminated");
        }
    });

    info!(
        server_name = %config.server_name,
        max_clients = config.max_clients,
        "Server startup complete"
    );

    // Wait for shutdown signal
    wait_for_shutdown().await;

    info!("Shutting down server...");
    manager.stop();
    let _ = accept_handle.await;

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ironmud=debug"));

    fmt().with_env_filter(filter).with_target(true).init();
}

/// Build the repository pair from config: a PostgreSQL pool when one can be
/// opened, otherwise in-memory stores so the server still comes up.
async fn create_repositories(
    config: &ServerConfig,
) -> (Arc<dyn PlayerRepository>, Arc<dyn CharacterRepository>) {
    if config.dev_mode {
        info!("Development mode: using in-memory stores");
        return memory_repositories();
    }

    match PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .connect(&config.database_url())
        .await
    {
        Ok(pool) => {
            info!("Database pool created for player persistence");
            (
                Arc::new(PgPlayerRepository::new(pool.clone())),
                Arc::new(PgCharacterRepository::new(pool)),
            )
        }
        Err(e) => {
            warn!(
                "Failed to create database pool: {}. Falling back to in-memory stores; \
                 accounts will not survive a restart.",
                e
            );
            memory_repositories()
        }
    }
}

fn memory_repositories() -> (Arc<dyn PlayerRepository>, Arc<dyn CharacterRepository>) {
    (
        Arc::new(MemoryPlayerRepository::new()),
        Arc::new(MemoryCharacterRepository::new()),
    )
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown() {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
