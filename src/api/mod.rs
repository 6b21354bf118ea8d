//! HTTP API: the task endpoint, the live-stats WebSocket and static assets.

mod error;
mod process;
mod routes;
mod stats_ws;
pub mod types;

pub use error::{ApiError, PARSE_FAILURE_MESSAGE};
pub use routes::{router, serve, AppState};
