pub mod config;
pub mod error;
pub mod secrets;
pub mod types;

pub use config::ArcticConfig;
pub use error::{ArcticError, Result};
pub use secrets::{Secrets, WarehouseSecrets};
pub use types::*;
