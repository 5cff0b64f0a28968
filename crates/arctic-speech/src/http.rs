//! Speech-to-text over HTTP.
//!
//! Posts the utterance as a multipart WAV upload (`file`, `model`,
//! `language`) and reads `{"text": ...}` back, the shape used by hosted
//! Whisper-style transcription endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use arctic_core::config::VoiceConfig;

use crate::error::SpeechError;
use crate::wav::{encode_wav, PcmAudio};
use crate::{SpeechToText, TranscriptionResult};

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// HTTP client for a hosted transcription endpoint.
pub struct HttpSpeechService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    language: String,
    api_key: Option<String>,
}

impl HttpSpeechService {
    pub fn new(config: &VoiceConfig, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
            api_key,
        }
    }

    fn form(&self, audio: &PcmAudio) -> Result<Form, SpeechError> {
        let part = Part::bytes(encode_wav(audio))
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        Ok(Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone()))
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechService {
    async fn transcribe(&self, audio: &PcmAudio) -> Result<TranscriptionResult, SpeechError> {
        if audio.samples.is_empty() {
            return Err(SpeechError::InvalidAudio(
                "cannot transcribe empty audio".to_string(),
            ));
        }

        let mut request = self.client.post(&self.endpoint).multipart(self.form(audio)?);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            duration_secs = audio.duration_secs(),
            "Submitting utterance for transcription"
        );

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Speech service returned an error");
            return Err(SpeechError::Unreachable(format!("{}: {}", status, body)));
        }

        let body: TranscriptionBody = response.json().await?;
        interpret(body, audio.duration_secs())
    }
}

fn interpret(body: TranscriptionBody, duration_secs: f32) -> Result<TranscriptionResult, SpeechError> {
    let text = body.text.trim().to_string();
    if text.is_empty() {
        return Err(SpeechError::Inaudible);
    }
    Ok(TranscriptionResult {
        text,
        language: body.language,
        duration_secs,
    })
}
