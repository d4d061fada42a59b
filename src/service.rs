//! Score Service
//!
//! Joins the authoritative store to the derived leaderboard. Every score
//! report commits to the store first and is then pushed to the engine while
//! the player's sequencing lock is still held, so the engine sees one
//! player's updates in commit order.
//!
//! ## Recovery
//!
//! The engine is rebuilt from a full store scan on startup and whenever an
//! index write fails. Rebuild takes the write side of a gate that every
//! commit-and-push holds the read side of, so no update can land between
//! the scan and the swap.
//!
//! A write that reached the store is reported as applied even if the
//! follow-up rebuild fails. The engine is then marked stale and the rebuild
//! is retried before the next write and on every flush.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use crate::core::player::{PlayerId, PlayerRecord};
use crate::leaderboard::{LeaderboardEngine, LeaderboardEntry, LeaderboardError};
use crate::store::{ScoreStore, StoreError};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Leaderboard size when the caller gives no limit.
    pub default_limit: usize,
    /// Largest leaderboard a caller may request.
    pub max_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            default_limit: 10,
            max_limit: 1000,
        }
    }
}

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Unknown player.
    #[error("player not found: {0}")]
    NotFound(String),

    /// Store unreachable or timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Leaderboard index could not be updated or rebuilt.
    #[error("index write failed: {0}")]
    IndexWriteFailed(String),

    /// Rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id.to_string()),
            StoreError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            StoreError::Unavailable(msg) => ServiceError::StoreUnavailable(msg),
            StoreError::Io(e) => ServiceError::StoreUnavailable(e.to_string()),
            StoreError::Serialization(msg) => ServiceError::StoreUnavailable(msg),
        }
    }
}

impl From<LeaderboardError> for ServiceError {
    fn from(err: LeaderboardError) -> Self {
        match err {
            LeaderboardError::NotFound(id) => ServiceError::NotFound(id.to_string()),
            LeaderboardError::IndexWriteFailed(msg) => ServiceError::IndexWriteFailed(msg),
            LeaderboardError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        }
    }
}

/// Per-player sequencing locks.
///
/// Players are never deleted, so the table grows with the player set.
#[derive(Default)]
struct PlayerSequencer {
    locks: parking_lot::Mutex<HashMap<PlayerId, Arc<Mutex<()>>>>,
}

impl PlayerSequencer {
    fn lock_for(&self, player_id: &PlayerId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(player_id.clone())
            .or_default()
            .clone()
    }
}

/// Player, score and leaderboard operations.
pub struct ScoreService {
    store: Arc<dyn ScoreStore>,
    engine: LeaderboardEngine,
    sequencer: PlayerSequencer,
    gate: RwLock<()>,
    rebuild_pending: AtomicBool,
    config: ServiceConfig,
}

impl ScoreService {
    /// Create a service with an empty engine. Call [`ScoreService::rebuild`]
    /// before serving if the store may already hold players.
    pub fn new(store: Arc<dyn ScoreStore>, engine: LeaderboardEngine, config: ServiceConfig) -> Self {
        Self {
            store,
            engine,
            sequencer: PlayerSequencer::default(),
            gate: RwLock::new(()),
            rebuild_pending: AtomicBool::new(false),
            config,
        }
    }

    /// Create a player unless it exists and make sure it is ranked.
    ///
    /// An empty or missing username falls back to the player id.
    #[instrument(skip(self))]
    pub async fn create_player(
        &self,
        player_id: &str,
        username: Option<&str>,
    ) -> Result<PlayerRecord, ServiceError> {
        let player_id = parse_id(player_id)?;
        let username = match username.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => player_id.to_string(),
        };
        self.retry_pending_rebuild().await;

        let (record, pushed) = {
            let _gate = self.gate.read().await;
            let lock = self.sequencer.lock_for(&player_id);
            let _turn = lock.lock().await;

            let record = self
                .timed("create_if_absent", self.store.create_if_absent(&player_id, &username))
                .await?;
            let pushed = self.engine.upsert_record(&record);
            (record, pushed)
        };

        self.repair_index(pushed).await;
        Ok(record)
    }

    /// Fetch a player record.
    pub async fn get_player(&self, player_id: &str) -> Result<PlayerRecord, ServiceError> {
        let player_id = parse_id(player_id)?;
        self.timed("get", self.store.get(&player_id)).await
    }

    /// Record one score report and re-rank the player.
    #[instrument(skip(self))]
    pub async fn report_score(
        &self,
        player_id: &str,
        delta: i64,
    ) -> Result<PlayerRecord, ServiceError> {
        let player_id = parse_id(player_id)?;
        if delta < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "score must be non-negative, got {}",
                delta
            )));
        }
        self.retry_pending_rebuild().await;

        let (record, pushed) = {
            let _gate = self.gate.read().await;
            let lock = self.sequencer.lock_for(&player_id);
            let _turn = lock.lock().await;

            let record = self
                .timed("apply_score", self.store.apply_score(&player_id, delta))
                .await?;
            let pushed = self.engine.upsert_record(&record);
            (record, pushed)
        };

        self.repair_index(pushed).await;
        info!(
            player = %record.player_id,
            delta,
            total_score = record.total_score,
            game_count = record.game_count,
            "score recorded"
        );
        Ok(record)
    }

    /// Change a player's display name.
    pub async fn rename_player(
        &self,
        player_id: &str,
        username: &str,
    ) -> Result<PlayerRecord, ServiceError> {
        let player_id = parse_id(player_id)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::InvalidInput("username must not be empty".into()));
        }
        self.timed("rename", self.store.rename(&player_id, username)).await
    }

    /// Set or clear the game a player is in.
    pub async fn set_current_game(
        &self,
        player_id: &str,
        game_id: Option<String>,
    ) -> Result<PlayerRecord, ServiceError> {
        let player_id = parse_id(player_id)?;
        let game_id = game_id.filter(|g| !g.trim().is_empty());
        self.timed("set_current_game", self.store.set_current_game(&player_id, game_id))
            .await
    }

    /// Best-ranked entries.
    ///
    /// `None` uses the configured default; zero or negative limits return
    /// nothing; large limits are capped.
    pub fn leaderboard(&self, limit: Option<i64>) -> Vec<LeaderboardEntry> {
        let k = match limit {
            None => self.config.default_limit,
            Some(k) if k <= 0 => 0,
            Some(k) => usize::try_from(k).unwrap_or(usize::MAX),
        };
        self.engine.top_k(k.min(self.config.max_limit))
    }

    /// Rank and ranked score of a player.
    pub fn rank_of(&self, player_id: &str) -> Result<LeaderboardEntry, ServiceError> {
        let player_id = parse_id(player_id)?;
        Ok(self.engine.entry(&player_id)?)
    }

    /// Number of ranked players.
    pub fn ranked_players(&self) -> usize {
        self.engine.len()
    }

    /// Rebuild the ranking from a full store scan.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<usize, ServiceError> {
        let _gate = self.gate.write().await;
        let rebuilt = match self.timed("load_all", self.store.load_all()).await {
            Ok(records) => self.engine.rebuild(&records).map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        self.rebuild_pending.store(rebuilt.is_err(), Ordering::Release);

        let count = rebuilt?;
        info!(players = count, "leaderboard rebuilt");
        Ok(count)
    }

    /// True while the engine may disagree with the store.
    pub fn index_stale(&self) -> bool {
        self.rebuild_pending.load(Ordering::Acquire)
    }

    /// Number of players in the store.
    pub async fn stored_players(&self) -> Result<usize, ServiceError> {
        self.timed("count", self.store.count()).await
    }

    /// Persist buffered store writes, first retrying any failed rebuild.
    pub async fn flush(&self) -> Result<(), ServiceError> {
        self.retry_pending_rebuild().await;
        self.timed("flush", self.store.flush()).await
    }

    /// Re-rank from the store after a committed write missed the engine.
    async fn repair_index(&self, pushed: Result<(), LeaderboardError>) {
        let Err(reason) = pushed else {
            return;
        };
        warn!(%reason, "leaderboard drifted, rebuilding from store");
        if let Err(e) = self.rebuild().await {
            error!(error = %e, "leaderboard rebuild failed, marked stale");
        }
    }

    async fn retry_pending_rebuild(&self) {
        if !self.index_stale() {
            return;
        }
        if let Err(e) = self.rebuild().await {
            warn!(error = %e, "stale leaderboard still not rebuilt");
        }
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => {
                warn!(op, timeout = ?self.config.store_timeout, "store call timed out");
                Err(ServiceError::StoreUnavailable(format!(
                    "{} timed out after {:?}",
                    op, self.config.store_timeout
                )))
            }
        }
    }
}

fn parse_id(raw: &str) -> Result<PlayerId, ServiceError> {
    PlayerId::parse(raw)
        .ok_or_else(|| ServiceError::InvalidInput("player id must not be empty".into()))
}
