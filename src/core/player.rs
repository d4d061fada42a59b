//! Player Identity and Records
//!
//! The authoritative player record kept by the score store, and the
//! identifier type shared by the store and the leaderboard.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Opaque player identifier.
///
/// Ordering is lexicographic on the underlying string, which is the final
/// leaderboard tie-break.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Create an identifier, rejecting empty or blank strings.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PLAYER RECORD
// =============================================================================

/// Authoritative player attributes.
///
/// `total_score` and `game_count` never decrease; `game_count` grows by
/// exactly one per accepted score report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Immutable identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub username: String,
    /// Game the player is currently in, if any.
    #[serde(default)]
    pub current_game_id: Option<String>,
    /// Sum of all reported scores.
    pub total_score: i64,
    /// Number of accepted score reports.
    pub game_count: i64,
    /// Unix seconds of creation or the latest score report.
    pub last_seen: i64,
}

impl PlayerRecord {
    /// Fresh record with zero score, seen at `now`.
    pub fn new(player_id: PlayerId, username: impl Into<String>, now: i64) -> Self {
        Self {
            player_id,
            username: username.into(),
            current_game_id: None,
            total_score: 0,
            game_count: 0,
            last_seen: now,
        }
    }

    /// Apply one score report.
    ///
    /// Returns `None` on overflow, leaving the record untouched.
    pub fn record_score(&mut self, delta: i64, now: i64) -> Option<()> {
        let total_score = self.total_score.checked_add(delta)?;
        let game_count = self.game_count.checked_add(1)?;
        self.total_score = total_score;
        self.game_count = game_count;
        self.last_seen = now;
        Some(())
    }
}
