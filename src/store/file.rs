//! JSON file-backed score store with atomic snapshot writes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::clock::{Clock, SystemClock};
use crate::core::player::{PlayerId, PlayerRecord};

use super::memory::MemoryScoreStore;
use super::{ScoreStore, StoreError};

/// File store. Loaded to memory on open, written back on flush.
///
/// Writes go to `<path>.tmp` first and are renamed over the snapshot, so a
/// crash mid-flush leaves the previous snapshot intact.
pub struct FileScoreStore {
    path: PathBuf,
    inner: MemoryScoreStore,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl FileScoreStore {
    /// Open on the system clock, creating parent directories if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Open with a custom clock.
    pub async fn open_with_clock(
        path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let records = if tokio::fs::try_exists(&path).await? {
            Self::load_from_file(&path).await?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), players = records.len(), "opened score store");

        Ok(Self {
            path,
            inner: MemoryScoreStore::from_records(records, clock),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        })
    }

    async fn load_from_file(path: &Path) -> Result<Vec<PlayerRecord>, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<PlayerRecord> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;

        for record in &records {
            if record.total_score < 0 || record.game_count < 0 {
                return Err(StoreError::Serialization(format!(
                    "record {} has negative totalScore {} or gameCount {}",
                    record.player_id, record.total_score, record.game_count
                )));
            }
        }
        Ok(records)
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    async fn write_snapshot(&self) -> Result<(), StoreError> {
        let mut records = self.inner.snapshot();
        records.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), players = records.len(), "flushed score store");
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for FileScoreStore {
    async fn get(&self, player_id: &PlayerId) -> Result<PlayerRecord, StoreError> {
        self.inner.get(player_id).await
    }

    async fn create_if_absent(
        &self,
        player_id: &PlayerId,
        username: &str,
    ) -> Result<PlayerRecord, StoreError> {
        let record = self.inner.create_if_absent(player_id, username).await?;
        self.mark_dirty();
        Ok(record)
    }

    async fn apply_score(
        &self,
        player_id: &PlayerId,
        delta: i64,
    ) -> Result<PlayerRecord, StoreError> {
        let record = self.inner.apply_score(player_id, delta).await?;
        self.mark_dirty();
        Ok(record)
    }

    async fn rename(
        &self,
        player_id: &PlayerId,
        username: &str,
    ) -> Result<PlayerRecord, StoreError> {
        let record = self.inner.rename(player_id, username).await?;
        self.mark_dirty();
        Ok(record)
    }

    async fn set_current_game(
        &self,
        player_id: &PlayerId,
        game_id: Option<String>,
    ) -> Result<PlayerRecord, StoreError> {
        let record = self.inner.set_current_game(player_id, game_id).await?;
        self.mark_dirty();
        Ok(record)
    }

    async fn load_all(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        self.inner.load_all().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.flush_lock.lock().await;
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(e) = self.write_snapshot().await {
            self.mark_dirty();
            return Err(e);
        }
        Ok(())
    }
}
