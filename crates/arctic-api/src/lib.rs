//! Arctic API crate - axum HTTP server, route handlers, SSE reply streaming.
//!
//! Serves the chat page and the session REST API: chat turns streamed as
//! server-sent events, upload analysis, PDF and chart downloads, voice
//! input and health checks.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
