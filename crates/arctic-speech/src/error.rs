//! Error types for voice capture and transcription.

use arctic_core::error::ArcticError;

/// Errors from the speech pipeline.
///
/// `Inaudible` and `Unreachable` are the two failure kinds reported to the
/// user; each carries its own message.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Sorry, I could not understand the audio. Please try again.")]
    Inaudible,
    #[error("Could not reach the speech recognition service: {0}")]
    Unreachable(String),
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
    #[error("voice input is disabled")]
    Disabled,
}

impl From<ArcticError> for SpeechError {
    fn from(err: ArcticError) -> Self {
        SpeechError::InvalidAudio(err.to_string())
    }
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Unreachable(err.to_string())
    }
}
