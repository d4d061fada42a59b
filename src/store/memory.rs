//! In-memory score store (does not persist across restarts).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::core::clock::{Clock, SystemClock};
use crate::core::player::{PlayerId, PlayerRecord};

use super::{ScoreStore, StoreError};

type Cell = Arc<Mutex<PlayerRecord>>;

/// In-memory store with one lock per player.
///
/// The map lock only guards membership and is never held while a record is
/// being modified.
pub struct MemoryScoreStore {
    players: RwLock<HashMap<PlayerId, Cell>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScoreStore {
    /// Empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_records(Vec::new(), clock)
    }

    /// Store preloaded with `records`.
    pub fn from_records(records: Vec<PlayerRecord>, clock: Arc<dyn Clock>) -> Self {
        let players = records
            .into_iter()
            .map(|record| (record.player_id.clone(), Arc::new(Mutex::new(record))))
            .collect();

        Self {
            players: RwLock::new(players),
            clock,
        }
    }

    /// Copy of every record.
    pub fn snapshot(&self) -> Vec<PlayerRecord> {
        let cells: Vec<Cell> = self.players.read().values().cloned().collect();
        cells.iter().map(|cell| cell.lock().clone()).collect()
    }

    fn cell(&self, player_id: &PlayerId) -> Result<Cell, StoreError> {
        self.players
            .read()
            .get(player_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(player_id.clone()))
    }

    fn cell_or_create(&self, player_id: &PlayerId, username: &str) -> Cell {
        if let Some(cell) = self.players.read().get(player_id) {
            return cell.clone();
        }

        let mut players = self.players.write();
        players
            .entry(player_id.clone())
            .or_insert_with(|| {
                let record = PlayerRecord::new(player_id.clone(), username, self.clock.now_secs());
                Arc::new(Mutex::new(record))
            })
            .clone()
    }

    fn update<F>(&self, player_id: &PlayerId, f: F) -> Result<PlayerRecord, StoreError>
    where
        F: FnOnce(&mut PlayerRecord),
    {
        let cell = self.cell(player_id)?;
        let mut record = cell.lock();
        f(&mut record);
        Ok(record.clone())
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn get(&self, player_id: &PlayerId) -> Result<PlayerRecord, StoreError> {
        let cell = self.cell(player_id)?;
        let record = cell.lock().clone();
        Ok(record)
    }

    async fn create_if_absent(
        &self,
        player_id: &PlayerId,
        username: &str,
    ) -> Result<PlayerRecord, StoreError> {
        let cell = self.cell_or_create(player_id, username);
        let record = cell.lock().clone();
        Ok(record)
    }

    async fn apply_score(
        &self,
        player_id: &PlayerId,
        delta: i64,
    ) -> Result<PlayerRecord, StoreError> {
        if delta < 0 {
            return Err(StoreError::InvalidInput(format!(
                "negative score delta {}",
                delta
            )));
        }

        // Unknown players fall back to their id as display name
        let cell = self.cell_or_create(player_id, player_id.as_str());
        let mut record = cell.lock();
        record
            .record_score(delta, self.clock.now_secs())
            .ok_or_else(|| {
                StoreError::InvalidInput(format!("score overflow for {}", player_id))
            })?;
        Ok(record.clone())
    }

    async fn rename(
        &self,
        player_id: &PlayerId,
        username: &str,
    ) -> Result<PlayerRecord, StoreError> {
        self.update(player_id, |record| record.username = username.to_string())
    }

    async fn set_current_game(
        &self,
        player_id: &PlayerId,
        game_id: Option<String>,
    ) -> Result<PlayerRecord, StoreError> {
        self.update(player_id, |record| record.current_game_id = game_id)
    }

    async fn load_all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.snapshot())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.players.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    fn pid(s: &str) -> PlayerId {
        PlayerId::parse(s).unwrap()
    }

    fn store_at(now: i64) -> (MemoryScoreStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        (MemoryScoreStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (store, _) = store_at(0);
        let result = store.get(&pid("nobody")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let (store, clock) = store_at(100);
        let first = store.create_if_absent(&pid("p1"), "Alice").await.unwrap();
        clock.advance(10);
        let second = store.create_if_absent(&pid("p1"), "Mallory").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.username, "Alice");
        assert_eq!(second.game_count, 0);
        assert_eq!(second.last_seen, 100);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_score_creates_with_id_as_username() {
        let (store, _) = store_at(50);
        let record = store.apply_score(&pid("p9"), 30).await.unwrap();

        assert_eq!(record.username, "p9");
        assert_eq!(record.total_score, 30);
        assert_eq!(record.game_count, 1);
        assert_eq!(record.last_seen, 50);
    }

    #[tokio::test]
    async fn test_apply_score_accumulates() {
        let (store, clock) = store_at(0);
        store.create_if_absent(&pid("p1"), "Alice").await.unwrap();
        store.apply_score(&pid("p1"), 10).await.unwrap();
        clock.set(77);
        let record = store.apply_score(&pid("p1"), 5).await.unwrap();

        assert_eq!(record.username, "Alice");
        assert_eq!(record.total_score, 15);
        assert_eq!(record.game_count, 2);
        assert_eq!(record.last_seen, 77);
    }

    #[tokio::test]
    async fn test_zero_delta_still_counts_game() {
        let (store, _) = store_at(0);
        let record = store.apply_score(&pid("p1"), 0).await.unwrap();
        assert_eq!(record.total_score, 0);
        assert_eq!(record.game_count, 1);
    }

    #[tokio::test]
    async fn test_negative_delta_rejected_without_create() {
        let (store, _) = store_at(0);
        let result = store.apply_score(&pid("p1"), -5).await;

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overflow_rejected() {
        let (store, _) = store_at(0);
        store.apply_score(&pid("p1"), i64::MAX).await.unwrap();
        let result = store.apply_score(&pid("p1"), 1).await;

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        let record = store.get(&pid("p1")).await.unwrap();
        assert_eq!(record.total_score, i64::MAX);
        assert_eq!(record.game_count, 1);
    }

    #[tokio::test]
    async fn test_rename_and_current_game() {
        let (store, _) = store_at(0);
        store.create_if_absent(&pid("p1"), "old").await.unwrap();

        let renamed = store.rename(&pid("p1"), "new").await.unwrap();
        assert_eq!(renamed.username, "new");

        let in_game = store
            .set_current_game(&pid("p1"), Some("g-1".into()))
            .await
            .unwrap();
        assert_eq!(in_game.current_game_id.as_deref(), Some("g-1"));

        let cleared = store.set_current_game(&pid("p1"), None).await.unwrap();
        assert!(cleared.current_game_id.is_none());

        let missing = store.rename(&pid("ghost"), "x").await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_apply_score_same_player() {
        let store = Arc::new(MemoryScoreStore::new());
        let mut handles = Vec::new();

        for task in 0..8i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100i64 {
                    store.apply_score(&pid("hot"), task + i).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let expected: i64 = (0..8i64).map(|t| (0..100i64).map(|i| t + i).sum::<i64>()).sum();
        let record = store.get(&pid("hot")).await.unwrap();
        assert_eq!(record.total_score, expected);
        assert_eq!(record.game_count, 800);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reports_create_once() {
        let store = Arc::new(MemoryScoreStore::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.apply_score(&pid("fresh"), 1).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(&pid("fresh")).await.unwrap().game_count, 16);
    }
}
