//! Arctic speech crate - microphone utterance capture and speech-to-text.
//!
//! Provides WAV decoding, energy-based utterance detection, a trait-based
//! abstraction over the speech-to-text service, an HTTP implementation and
//! a mock for tests.

pub mod error;
pub mod http;
pub mod utterance;
pub mod wav;

use std::sync::Mutex;

use async_trait::async_trait;

pub use error::SpeechError;
pub use http::HttpSpeechService;
pub use utterance::{EnergyVad, UtteranceDetector, VadResult, VoiceActivityDetector};
pub use wav::{decode_wav, encode_wav, PcmAudio};

// =============================================================================
// Result types
// =============================================================================

/// The result of a transcription request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    /// Recognized text, trimmed.
    pub text: String,
    /// Language reported by the service, if any.
    pub language: Option<String>,
    /// Duration of the submitted audio in seconds.
    pub duration_secs: f32,
}

// =============================================================================
// Trait
// =============================================================================

/// External speech-to-text service.
///
/// Implementations return `SpeechError::Inaudible` when the service answers
/// but recognizes nothing, and `SpeechError::Unreachable` when the service
/// cannot be contacted or fails.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &PcmAudio) -> Result<TranscriptionResult, SpeechError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted response of [`MockSpeechService`].
#[derive(Debug, Clone)]
pub enum MockSpeechReply {
    Text(String),
    Inaudible,
    Unreachable,
}

/// Mock speech service returning a fixed reply.
#[derive(Debug)]
pub struct MockSpeechService {
    reply: MockSpeechReply,
    calls: Mutex<usize>,
}

impl MockSpeechService {
    pub fn new(reply: MockSpeechReply) -> Self {
        Self {
            reply,
            calls: Mutex::new(0),
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self::new(MockSpeechReply::Text(text.to_string()))
    }

    /// Number of transcription requests received.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl SpeechToText for MockSpeechService {
    async fn transcribe(&self, audio: &PcmAudio) -> Result<TranscriptionResult, SpeechError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        if audio.samples.is_empty() {
            return Err(SpeechError::InvalidAudio(
                "cannot transcribe empty audio".to_string(),
            ));
        }
        match &self.reply {
            MockSpeechReply::Text(text) => Ok(TranscriptionResult {
                text: text.clone(),
                language: Some("en".to_string()),
                duration_secs: audio.duration_secs(),
            }),
            MockSpeechReply::Inaudible => Err(SpeechError::Inaudible),
            MockSpeechReply::Unreachable => {
                Err(SpeechError::Unreachable("mock service offline".to_string()))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
