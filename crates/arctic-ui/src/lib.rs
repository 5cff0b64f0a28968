//! Arctic UI crate - the embedded chat page.
//!
//! The page is a single self-contained HTML file with inline CSS and
//! JavaScript, embedded at compile time via `include_str!`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use arctic_ui::CHAT_HTML;
//!
//! async fn ui_handler() -> axum::response::Html<&'static str> {
//!     axum::response::Html(CHAT_HTML)
//! }
//! ```

pub mod chat_page;

pub use chat_page::CHAT_HTML;
