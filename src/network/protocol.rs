//! Protocol Messages
//!
//! Query parameters and JSON bodies of the REST interface. Player records
//! and leaderboard entries are returned as-is; everything else is defined
//! here.

use serde::{Deserialize, Serialize};

// =============================================================================
// REQUESTS
// =============================================================================

/// `POST /players/{id}` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePlayerParams {
    /// Display name; defaults to the player id.
    pub username: Option<String>,
}

/// `POST /players/{id}/score` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreParams {
    /// Points earned in one game.
    pub score: i64,
}

/// `GET /leaderboard` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardParams {
    /// Number of entries; server default when absent.
    pub limit: Option<i64>,
}

/// `PUT /players/{id}/username` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameParams {
    /// New display name.
    pub username: String,
}

/// `PUT /players/{id}/game` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentGameParams {
    /// Game id; absent clears it.
    pub game_id: Option<String>,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the store or the ranking is behind.
    pub status: String,
    /// Ranked player count.
    pub players: usize,
    /// Stored player count; absent when the store did not answer.
    pub stored_players: Option<usize>,
    /// Server version.
    pub version: String,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Player or rank not found.
    NotFound,
    /// Bad request parameters.
    InvalidInput,
    /// Backing store unreachable.
    StoreUnavailable,
    /// Leaderboard index could not be repaired.
    IndexWriteFailed,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code.
    pub error: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}
