//! Leaderboard Engine
//!
//! Incrementally maintained ranking over every player's total score.
//! Score updates reposition a single entry; top-K and rank queries never
//! rescan the player set.
//!
//! ## Ordering
//!
//! 1. Higher `total_score` first
//! 2. Equal scores: earlier `last_seen` first
//! 3. Still equal: lexicographically smaller player id first
//!
//! ## Concurrency
//!
//! The index sits behind a task-fair `parking_lot::RwLock`. Queries share
//! the read side; `upsert` and `rebuild` hold the write side only for the
//! O(log n) tree edit or the final swap. Callers are responsible for
//! delivering updates for one player in commit order.

pub mod tree;

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::player::{PlayerId, PlayerRecord};

pub use tree::{RankKey, RankTree};

/// Default seed for treap priorities.
pub const DEFAULT_INDEX_SEED: u64 = 0x5EED_1EAD_B0A2_D000;

/// One ranked row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Score at last sync.
    pub total_score: i64,
    /// 1-based rank.
    pub rank: usize,
}

/// Leaderboard errors.
#[derive(Debug, Error)]
pub enum LeaderboardError {
    /// Player has no ranked entry.
    #[error("player not ranked: {0}")]
    NotFound(PlayerId),

    /// Index edit could not be applied; the index has drifted.
    #[error("index write failed: {0}")]
    IndexWriteFailed(String),

    /// Rejected before touching the index.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Ranking structure plus the current key of every ranked player.
#[derive(Debug)]
struct Index {
    tree: RankTree,
    keys: HashMap<PlayerId, RankKey>,
}

impl Index {
    fn new(seed: u64) -> Self {
        Self {
            tree: RankTree::new(seed),
            keys: HashMap::new(),
        }
    }
}

/// The leaderboard engine.
#[derive(Debug)]
pub struct LeaderboardEngine {
    index: RwLock<Index>,
    seed: u64,
}

impl LeaderboardEngine {
    /// Empty engine with the default priority seed.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_INDEX_SEED)
    }

    /// Empty engine with an explicit priority seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            index: RwLock::new(Index::new(seed)),
            seed,
        }
    }

    /// Insert or reposition a player.
    ///
    /// A no-op when the key is unchanged.
    pub fn upsert(
        &self,
        player_id: &PlayerId,
        total_score: i64,
        last_seen: i64,
    ) -> Result<(), LeaderboardError> {
        if total_score < 0 {
            return Err(LeaderboardError::InvalidInput(format!(
                "negative total score {} for {}",
                total_score, player_id
            )));
        }

        let key = RankKey::new(player_id.clone(), total_score, last_seen);
        let mut index = self.index.write();

        if let Some(old) = index.keys.get(player_id).cloned() {
            if old == key {
                return Ok(());
            }
            if !index.tree.remove(&old) {
                warn!(player = %player_id, "ranked key missing from tree");
                return Err(LeaderboardError::IndexWriteFailed(format!(
                    "stale key for {} not found in tree",
                    player_id
                )));
            }
        }

        if !index.tree.insert(key.clone()) {
            return Err(LeaderboardError::IndexWriteFailed(format!(
                "duplicate key for {}",
                player_id
            )));
        }
        index.keys.insert(player_id.clone(), key);

        debug!(player = %player_id, total_score, last_seen, "leaderboard upsert");
        Ok(())
    }

    /// Upsert from an authoritative record.
    pub fn upsert_record(&self, record: &PlayerRecord) -> Result<(), LeaderboardError> {
        self.upsert(&record.player_id, record.total_score, record.last_seen)
    }

    /// The `k` best-ranked entries, rank 1 first.
    pub fn top_k(&self, k: usize) -> Vec<LeaderboardEntry> {
        if k == 0 {
            return Vec::new();
        }
        let index = self.index.read();
        index
            .tree
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, key)| LeaderboardEntry {
                player_id: key.player_id.clone(),
                total_score: key.total_score,
                rank: i + 1,
            })
            .collect()
    }

    /// 1-based rank of a player.
    pub fn rank_of(&self, player_id: &PlayerId) -> Result<usize, LeaderboardError> {
        self.entry(player_id).map(|entry| entry.rank)
    }

    /// Ranked row for a player.
    pub fn entry(&self, player_id: &PlayerId) -> Result<LeaderboardEntry, LeaderboardError> {
        let index = self.index.read();
        let key = index
            .keys
            .get(player_id)
            .ok_or_else(|| LeaderboardError::NotFound(player_id.clone()))?;
        let rank = index.tree.rank_of(key).ok_or_else(|| {
            LeaderboardError::IndexWriteFailed(format!("{} indexed but not in tree", player_id))
        })?;

        Ok(LeaderboardEntry {
            player_id: player_id.clone(),
            total_score: key.total_score,
            rank,
        })
    }

    /// Replace the whole ranking with one built from `records`.
    ///
    /// The new index is built off-lock and swapped in; on error the current
    /// ranking is left untouched.
    pub fn rebuild<'a, I>(&self, records: I) -> Result<usize, LeaderboardError>
    where
        I: IntoIterator<Item = &'a PlayerRecord>,
    {
        let mut fresh = Index::new(self.seed);

        for record in records {
            if record.total_score < 0 {
                return Err(LeaderboardError::InvalidInput(format!(
                    "negative total score {} for {}",
                    record.total_score, record.player_id
                )));
            }
            let key = RankKey::new(
                record.player_id.clone(),
                record.total_score,
                record.last_seen,
            );
            if let Some(previous) = fresh.keys.insert(record.player_id.clone(), key.clone()) {
                fresh.tree.remove(&previous);
            }
            fresh.tree.insert(key);
        }

        let count = fresh.tree.len();
        *self.index.write() = fresh;
        Ok(count)
    }

    /// Number of ranked players.
    pub fn len(&self) -> usize {
        self.index.read().tree.len()
    }

    /// True when nobody is ranked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a player's tree node while keeping its key mapping.
    #[cfg(test)]
    pub(crate) fn corrupt_tree_for(&self, player_id: &PlayerId) {
        let mut index = self.index.write();
        if let Some(key) = index.keys.get(player_id).cloned() {
            index.tree.remove(&key);
        }
    }
}

impl Default for LeaderboardEngine {
    fn default() -> Self {
        Self::new()
    }
}
