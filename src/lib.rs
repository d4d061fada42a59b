//! # playerd
//!
//! Player profiles, score tracking and an incrementally maintained
//! leaderboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          PLAYERD                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── player.rs   - PlayerId and PlayerRecord                 │
//! │  ├── clock.rs    - Unix time source                          │
//! │  └── rng.rs      - Xorshift128+ for index priorities         │
//! │                                                              │
//! │  store/          - Authoritative records                     │
//! │  ├── memory.rs   - Per-player locked in-memory store         │
//! │  └── file.rs     - JSON snapshot store                       │
//! │                                                              │
//! │  leaderboard/    - Derived ranking                           │
//! │  └── tree.rs     - Order-statistics treap                    │
//! │                                                              │
//! │  service.rs      - Store → leaderboard sync and recovery     │
//! │                                                              │
//! │  network/        - REST interface                            │
//! │  ├── routes.rs   - axum handlers                             │
//! │  ├── protocol.rs - Query and response types                  │
//! │  └── server.rs   - Listener, flush loop, shutdown            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The store is the source of truth. A score report commits to the store and
//! is then pushed to the leaderboard under a per-player lock, so each
//! player's updates reach the ranking in commit order. The ranking can always
//! be rebuilt from a full store scan.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod leaderboard;
pub mod network;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use crate::core::player::{PlayerId, PlayerRecord};
pub use leaderboard::{LeaderboardEngine, LeaderboardEntry, LeaderboardError};
pub use service::{ScoreService, ServiceConfig, ServiceError};
pub use store::{FileScoreStore, MemoryScoreStore, ScoreStore, StoreError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
