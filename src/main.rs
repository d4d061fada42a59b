//! playerd
//!
//! Player profile and leaderboard server.
//! Configuration comes from `PLAYERD_*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use playerd::{
    network::{PlayerServer, ServerConfig},
    FileScoreStore, LeaderboardEngine, MemoryScoreStore, ScoreService, ScoreStore, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();
    info!("playerd v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!("Store timeout: {:?}", config.store_timeout);

    let store: Arc<dyn ScoreStore> = match &config.data_path {
        Some(path) => {
            info!("Using file store at {}", path.display());
            Arc::new(
                FileScoreStore::open(path)
                    .await
                    .with_context(|| format!("failed to open store at {}", path.display()))?,
            )
        }
        None => {
            info!("Using in-memory store");
            Arc::new(MemoryScoreStore::new())
        }
    };

    let engine = LeaderboardEngine::with_seed(config.index_seed);
    let service = Arc::new(ScoreService::new(store, engine, config.service_config()));

    let ranked = service
        .rebuild()
        .await
        .context("failed to build leaderboard from store")?;
    info!("Leaderboard ready with {} players", ranked);

    let server = Arc::new(PlayerServer::new(config, service));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_server.shutdown(),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("playerd stopped");
    Ok(())
}
