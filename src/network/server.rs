//! HTTP Player Server
//!
//! Binds the REST router, runs the periodic store flush and coordinates
//! graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::leaderboard::DEFAULT_INDEX_SEED;
use crate::network::routes::router;
use crate::service::{ScoreService, ServiceConfig, ServiceError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Snapshot file; in-memory only when `None`.
    pub data_path: Option<PathBuf>,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Period of the background store flush.
    pub flush_interval: Duration,
    /// Leaderboard size when no limit is given.
    pub default_limit: usize,
    /// Largest leaderboard a caller may request.
    pub max_limit: usize,
    /// Seed for leaderboard index priorities.
    pub index_seed: u64,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_path: None,
            store_timeout: Duration::from_millis(2000),
            flush_interval: Duration::from_secs(5),
            default_limit: 10,
            max_limit: 1000,
            index_seed: DEFAULT_INDEX_SEED,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("PLAYERD_BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_path: std::env::var("PLAYERD_DATA_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            store_timeout: env_parse("PLAYERD_STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            flush_interval: env_parse("PLAYERD_FLUSH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.flush_interval),
            default_limit: env_parse("PLAYERD_LEADERBOARD_DEFAULT_LIMIT")
                .unwrap_or(defaults.default_limit),
            max_limit: env_parse("PLAYERD_LEADERBOARD_MAX_LIMIT").unwrap_or(defaults.max_limit),
            index_seed: env_parse("PLAYERD_INDEX_SEED").unwrap_or(defaults.index_seed),
            version: defaults.version,
        }
    }

    /// Settings for the score service.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            store_timeout: self.store_timeout,
            default_limit: self.default_limit,
            max_limit: self.max_limit.max(1),
        }
    }
}

/// Read and parse an environment variable, warning on malformed values.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed environment variable");
            None
        }
    }
}

/// Player server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Service error during startup or shutdown.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// The player server.
pub struct PlayerServer {
    config: ServerConfig,
    service: Arc<ScoreService>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PlayerServer {
    /// Create a server around a ready service.
    pub fn new(config: ServerConfig, service: Arc<ScoreService>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            service,
            shutdown_tx,
        }
    }

    /// The shared service.
    pub fn service(&self) -> &Arc<ScoreService> {
        &self.service
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            addr = %listener.local_addr()?,
            version = %self.config.version,
            "player server listening"
        );

        let flush_service = self.service.clone();
        let flush_interval = self.config.flush_interval;
        let flush_handle = tokio::spawn(async move {
            Self::run_flush_loop(flush_service, flush_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let app = router(self.service.clone());
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutdown signal received");
            })
            .await;

        flush_handle.abort();

        if let Err(e) = self.service.flush().await {
            error!("Final flush failed: {}", e);
        }

        served?;
        Ok(())
    }

    /// Flush the store on a fixed period.
    async fn run_flush_loop(service: Arc<ScoreService>, period: Duration) {
        let mut ticker = interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = service.flush().await {
                warn!("Periodic flush failed: {}", e);
            }
        }
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::LeaderboardEngine;
    use crate::store::{FileScoreStore, MemoryScoreStore, ScoreStore};

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.default_limit, 10);
        assert!(config.data_path.is_none());
        assert_eq!(config.service_config().max_limit, 1000);
    }

    #[tokio::test]
    async fn test_server_shutdown_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.json");
        let store = Arc::new(FileScoreStore::open(&path).await.unwrap());
        let service = Arc::new(ScoreService::new(
            store.clone(),
            LeaderboardEngine::new(),
            ServiceConfig::default(),
        ));
        service.report_score("p1", 12).await.unwrap();

        let server = Arc::new(PlayerServer::new(ServerConfig::default(), service));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(listener).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();
        handle.await.unwrap().unwrap();

        assert!(!store.is_dirty());
        let reopened = FileScoreStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let service = Arc::new(ScoreService::new(
            Arc::new(MemoryScoreStore::new()),
            LeaderboardEngine::new(),
            ServiceConfig::default(),
        ));
        let server = PlayerServer::new(ServerConfig::default(), service);
        assert_eq!(server.service().ranked_players(), 0);
        server.shutdown();
    }
}
