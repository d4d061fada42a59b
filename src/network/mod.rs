//! Network Layer
//!
//! REST interface over the score service. Handlers stay thin: parse,
//! call one service operation, map errors to status codes.

pub mod protocol;
pub mod routes;
pub mod server;

pub use protocol::{ErrorBody, ErrorCode, HealthResponse};
pub use routes::{router, ApiError};
pub use server::{PlayerServer, ServerConfig, ServerError};
