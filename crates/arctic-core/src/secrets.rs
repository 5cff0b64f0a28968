//! Externally supplied credentials.
//!
//! Secrets come from a flat TOML file (`KEY = "value"`) and the process
//! environment, with the environment taking precedence. Values are never
//! printed: `Debug` output is redacted.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ArcticError, Result};

pub const REPLICATE_API_TOKEN: &str = "REPLICATE_API_TOKEN";
pub const SPEECH_API_KEY: &str = "SPEECH_API_KEY";

const WAREHOUSE_KEYS: [&str; 6] = [
    "SNOWFLAKE_USER",
    "SNOWFLAKE_PASSWORD",
    "SNOWFLAKE_ACCOUNT",
    "SNOWFLAKE_WAREHOUSE",
    "SNOWFLAKE_DATABASE",
    "SNOWFLAKE_SCHEMA",
];

/// Credentials consumed at startup.
#[derive(Clone, Default)]
pub struct Secrets {
    replicate_api_token: Option<String>,
    speech_api_key: Option<String>,
    pub warehouse: WarehouseSecrets,
}

/// Data-warehouse connection parameters.
///
/// Loaded alongside the inference credential but not used by the chat
/// pipeline.
#[derive(Clone, Default)]
pub struct WarehouseSecrets {
    pub user: Option<String>,
    pub password: Option<String>,
    pub account: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl WarehouseSecrets {
    /// True when every connection parameter is present.
    pub fn is_complete(&self) -> bool {
        self.user.is_some()
            && self.password.is_some()
            && self.account.is_some()
            && self.warehouse.is_some()
            && self.database.is_some()
            && self.schema.is_some()
    }

    /// Connection target without credentials, suitable for logs.
    pub fn target(&self) -> Option<String> {
        Some(format!(
            "{}/{}/{}.{}",
            self.account.as_deref()?,
            self.warehouse.as_deref()?,
            self.database.as_deref()?,
            self.schema.as_deref()?
        ))
    }
}

impl Secrets {
    /// Load secrets from `path` (optional) and the environment.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: &Path) -> Result<Self> {
        let file_values = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let values = parse_secret_store(&content)?;
            info!(path = %path.display(), keys = values.len(), "Secret store loaded");
            values
        } else {
            debug!(path = %path.display(), "No secret store file, using environment only");
            HashMap::new()
        };
        Ok(Self::from_sources(&file_values, |key| std::env::var(key).ok()))
    }

    /// Build secrets from file values and an environment lookup.
    pub fn from_sources<F>(file_values: &HashMap<String, String>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            env(key)
                .or_else(|| file_values.get(key).cloned())
                .filter(|v| !v.trim().is_empty())
        };

        let [user, password, account, warehouse, database, schema] = WAREHOUSE_KEYS.map(|key| get(key));

        Self {
            replicate_api_token: get(REPLICATE_API_TOKEN),
            speech_api_key: get(SPEECH_API_KEY),
            warehouse: WarehouseSecrets {
                user,
                password,
                account,
                warehouse,
                database,
                schema,
            },
        }
    }

    /// The inference API credential. Required.
    pub fn replicate_api_token(&self) -> Result<&str> {
        self.replicate_api_token
            .as_deref()
            .ok_or_else(|| ArcticError::MissingSecret(REPLICATE_API_TOKEN.to_string()))
    }

    /// Optional bearer key for the speech-to-text service.
    pub fn speech_api_key(&self) -> Option<&str> {
        self.speech_api_key.as_deref()
    }
}

/// Parse a flat `KEY = "value"` TOML document. Nested tables are rejected.
fn parse_secret_store(content: &str) -> Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(content)
        .map_err(|e| ArcticError::Secrets(format!("invalid secret store: {}", e)))?;
    let mut values = HashMap::with_capacity(table.len());
    for (key, value) in table {
        match value {
            toml::Value::String(s) => {
                values.insert(key, s);
            }
            toml::Value::Integer(i) => {
                values.insert(key, i.to_string());
            }
            other => {
                return Err(ArcticError::Secrets(format!(
                    "secret '{}' must be a string, got {}",
                    key,
                    other.type_str()
                )));
            }
        }
    }
    Ok(values)
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("replicate_api_token", &redact(&self.replicate_api_token))
            .field("speech_api_key", &redact(&self.speech_api_key))
            .field("warehouse", &self.warehouse)
            .finish()
    }
}

impl fmt::Debug for WarehouseSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSecrets")
            .field("user", &redact(&self.user))
            .field("password", &redact(&self.password))
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}
