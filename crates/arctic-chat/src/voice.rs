//! Voice input: turn a recorded utterance into a user turn.

use std::sync::Arc;

use arctic_core::config::VoiceConfig;
use arctic_speech::{decode_wav, SpeechError, SpeechToText, UtteranceDetector};

use crate::error::ChatError;
use crate::session::ChatSession;

/// Microphone-to-transcript adapter.
pub struct VoiceInput {
    detector: UtteranceDetector,
    speech: Arc<dyn SpeechToText>,
    enabled: bool,
}

impl VoiceInput {
    pub fn new(config: &VoiceConfig, speech: Arc<dyn SpeechToText>) -> Self {
        Self {
            detector: UtteranceDetector::from_config(config),
            speech,
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Transcribe the first utterance in `wav` and append it as a user turn.
    ///
    /// The session is only modified on success.
    pub async fn capture_and_submit(
        &self,
        session: &mut ChatSession,
        wav: &[u8],
    ) -> Result<String, ChatError> {
        if !self.enabled {
            return Err(SpeechError::Disabled.into());
        }
        if session.is_aborted() {
            return Err(ChatError::SessionAborted);
        }

        let recording = decode_wav(wav)?;
        let utterance = self.detector.capture(&recording)?;
        let transcript = self.speech.transcribe(&utterance).await?;

        tracing::info!(
            session_id = %session.id,
            duration_secs = transcript.duration_secs,
            chars = transcript.text.len(),
            "Voice input transcribed"
        );
        session.push_user(&transcript.text);
        Ok(transcript.text)
    }
}
