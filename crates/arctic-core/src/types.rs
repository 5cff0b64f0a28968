//! Shared domain types: transcript messages and per-session UI controls.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{ArcticError, Result};

/// Accepted sampling temperature values.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.01..=5.0;
/// Accepted nucleus-sampling values.
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.01..=1.0;

// =============================================================================
// Message
// =============================================================================

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// SessionControls
// =============================================================================

/// Sampling parameters chosen through the sidebar sliders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionControls {
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for SessionControls {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

impl SessionControls {
    /// Build controls, rejecting values outside the slider ranges.
    pub fn new(temperature: f64, top_p: f64) -> Result<Self> {
        let controls = Self { temperature, top_p };
        controls.validate()?;
        Ok(controls)
    }

    pub fn validate(&self) -> Result<()> {
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(ArcticError::InvalidControl(format!(
                "temperature {} outside {}..={}",
                self.temperature,
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        if !TOP_P_RANGE.contains(&self.top_p) {
            return Err(ArcticError::InvalidControl(format!(
                "top_p {} outside {}..={}",
                self.top_p,
                TOP_P_RANGE.start(),
                TOP_P_RANGE.end()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// ExportedDocument
// =============================================================================

/// A generated document ready to be served as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_message_constructors() {
        let m = Message::user("hi");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "hi");

        let m = Message::assistant(String::new());
        assert_eq!(m.role, Role::Assistant);
        assert!(m.content.is_empty());
    }

    #[test]
    fn test_controls_default_is_valid() {
        assert!(SessionControls::default().validate().is_ok());
    }

    #[test]
    fn test_controls_bounds_are_inclusive() {
        assert!(SessionControls::new(0.01, 0.01).is_ok());
        assert!(SessionControls::new(5.0, 1.0).is_ok());
    }

    #[test]
    fn test_controls_reject_out_of_range() {
        assert!(SessionControls::new(0.0, 0.9).is_err());
        assert!(SessionControls::new(5.01, 0.9).is_err());
        assert!(SessionControls::new(0.3, 0.0).is_err());
        assert!(SessionControls::new(0.3, 1.5).is_err());
        assert!(SessionControls::new(f64::NAN, 0.9).is_err());
    }

    #[test]
    fn test_controls_error_message() {
        let err = SessionControls::new(9.0, 0.9).unwrap_err();
        assert!(err.to_string().contains("temperature 9"));
    }
}
