//! Score Store
//!
//! Authoritative player records. Every backend guarantees that score
//! reports for one player are applied atomically and that different players
//! never contend on the same lock.

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::player::{PlayerId, PlayerRecord};

pub use file::FileScoreStore;
pub use memory::MemoryScoreStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record for this player.
    #[error("player not found: {0}")]
    NotFound(PlayerId),

    /// Rejected before any write.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backing storage could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backing file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Player record persistence.
///
/// A failed call has not been partially applied.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Fetch a record.
    async fn get(&self, player_id: &PlayerId) -> Result<PlayerRecord, StoreError>;

    /// Create a record unless one exists; returns whichever is stored.
    async fn create_if_absent(
        &self,
        player_id: &PlayerId,
        username: &str,
    ) -> Result<PlayerRecord, StoreError>;

    /// Add `delta` to the player's total, bump the game count and refresh
    /// `last_seen`, all atomically.
    ///
    /// Unknown players are created first with `username = player_id`.
    /// Negative deltas are rejected.
    async fn apply_score(&self, player_id: &PlayerId, delta: i64)
        -> Result<PlayerRecord, StoreError>;

    /// Change a player's display name.
    async fn rename(&self, player_id: &PlayerId, username: &str)
        -> Result<PlayerRecord, StoreError>;

    /// Set or clear the game a player is currently in.
    async fn set_current_game(
        &self,
        player_id: &PlayerId,
        game_id: Option<String>,
    ) -> Result<PlayerRecord, StoreError>;

    /// Every stored record.
    async fn load_all(&self) -> Result<Vec<PlayerRecord>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Persist buffered writes.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
