//! Core primitives.
//!
//! Identity, records, time and randomness shared by the store and the
//! leaderboard.

pub mod clock;
pub mod player;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, SystemClock};
pub use player::{PlayerId, PlayerRecord};
pub use rng::DeterministicRng;
