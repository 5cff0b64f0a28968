use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ArcticError, Result};
use crate::types::{TEMPERATURE_RANGE, TOP_P_RANGE};

/// Greeting shown as the first assistant message of every session.
pub const DEFAULT_GREETING: &str = "Hello there! I'm Vision, the sleek new creation from Snowflake AI Research. Ready for an adventure in knowledge? Fire away with your questions!";

/// Smallest chart edge in pixels; charts draw inside a 40px margin.
pub const MIN_CHART_SIZE: u32 = 120;

/// Top-level configuration for the Arctic Vision server.
///
/// Loaded from `~/.arctic/config.toml` by default. Each section corresponds
/// to one component of the chat pipeline or a cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArcticConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl ArcticConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ArcticConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !TEMPERATURE_RANGE.contains(&self.model.default_temperature) {
            return Err(ArcticError::Config(format!(
                "model.default_temperature must be within {:?}",
                TEMPERATURE_RANGE
            )));
        }
        if !TOP_P_RANGE.contains(&self.model.default_top_p) {
            return Err(ArcticError::Config(format!(
                "model.default_top_p must be within {:?}",
                TOP_P_RANGE
            )));
        }
        if self.chat.max_prompt_tokens == 0 {
            return Err(ArcticError::Config(
                "chat.max_prompt_tokens must be greater than 0".to_string(),
            ));
        }
        if self.model.name.split('/').count() != 2 {
            return Err(ArcticError::Config(format!(
                "model.name must be 'owner/name', got '{}'",
                self.model.name
            )));
        }
        if self.analysis.chart_width < MIN_CHART_SIZE
            || self.analysis.chart_height < MIN_CHART_SIZE
        {
            return Err(ArcticError::Config(format!(
                "analysis chart dimensions must be at least {}px, got {}x{}",
                MIN_CHART_SIZE, self.analysis.chart_width, self.analysis.chart_height
            )));
        }
        if self.export.wrap_columns == 0 {
            return Err(ArcticError::Config(
                "export.wrap_columns must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Path to the flat TOML secret store.
    pub secrets_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            secrets_path: "~/.arctic/secrets.toml".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted upload size in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_mb: 200,
        }
    }
}

/// Hosted inference model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hosted model in `owner/name` form.
    pub name: String,
    /// Base URL of the inference API.
    pub api_base: String,
    /// Template the endpoint wraps the prompt in.
    pub prompt_template: String,
    pub default_temperature: f64,
    pub default_top_p: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "snowflake/snowflake-arctic-instruct".to_string(),
            api_base: "https://api.replicate.com/v1".to_string(),
            prompt_template: "{prompt}".to_string(),
            default_temperature: 0.3,
            default_top_p: 0.9,
        }
    }
}

/// Chat session and token budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub greeting: String,
    /// Prompts with this many tokens or more are rejected.
    pub max_prompt_tokens: usize,
    /// HuggingFace `tokenizer.json`. When unset, an approximate counter is used.
    pub tokenizer_path: Option<String>,
    /// Sessions idle for longer than this are discarded.
    pub session_timeout_minutes: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            max_prompt_tokens: 1500,
            tokenizer_path: None,
            session_timeout_minutes: 120,
        }
    }
}

/// Uploaded-file analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rows of the uploaded table embedded into the analysis prompt.
    pub preview_rows: usize,
    /// Categories kept in a pie chart.
    pub max_pie_slices: usize,
    /// Chart image width in pixels.
    pub chart_width: u32,
    /// Chart image height in pixels.
    pub chart_height: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preview_rows: 10,
            max_pie_slices: 10,
            chart_width: 800,
            chart_height: 600,
        }
    }
}

/// PDF export layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub wrap_columns: usize,
    pub font_size: f32,
    pub line_height_mm: f32,
    pub image_width_mm: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            wrap_columns: 90,
            font_size: 12.0,
            line_height_mm: 6.0,
            image_width_mm: 190.0,
        }
    }
}

/// Voice input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// Speech-to-text endpoint accepting multipart audio uploads.
    pub endpoint: String,
    pub model: String,
    pub language: String,
    /// Silence that ends an utterance, in milliseconds.
    pub silence_timeout_ms: u32,
    /// RMS energy above which a frame counts as speech.
    pub energy_threshold: f32,
    /// Hard cap on utterance length.
    pub max_duration_secs: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            silence_timeout_ms: 1000,
            energy_threshold: 0.01,
            max_duration_secs: 30,
        }
    }
}
