//! Streaming inference abstraction.
//!
//! A client turns an [`InferenceRequest`] into a channel of text fragments.
//! The channel closing marks the end of the response.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use arctic_core::config::ModelConfig;
use arctic_core::types::SessionControls;

use crate::error::ChatError;

/// Fragments of one response, in order. Not restartable.
pub type FragmentReceiver = mpsc::Receiver<Result<String, ChatError>>;

/// Capacity of fragment channels between the transport task and consumers.
pub const FRAGMENT_BUFFER: usize = 64;

/// Parameters of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    /// Model identifier in `owner/name` form.
    pub model: String,
    pub prompt: String,
    pub prompt_template: String,
    pub temperature: f64,
    pub top_p: f64,
}

impl InferenceRequest {
    pub fn new(model: &ModelConfig, prompt: String, controls: &SessionControls) -> Self {
        Self {
            model: model.name.clone(),
            prompt,
            prompt_template: model.prompt_template.clone(),
            temperature: controls.temperature,
            top_p: controls.top_p,
        }
    }
}

/// A hosted language model that streams its reply.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Start generation. Errors before the first fragment are returned
    /// directly; later failures arrive as an `Err` item on the channel.
    async fn stream(&self, request: InferenceRequest) -> Result<FragmentReceiver, ChatError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted client for tests and offline development.
pub struct MockInferenceClient {
    fragments: Vec<String>,
    trailing_failure: Option<String>,
    refuse: Option<String>,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl MockInferenceClient {
    /// Stream `fragments` and end normally.
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            trailing_failure: None,
            refuse: None,
            last_request: Mutex::new(None),
        }
    }

    /// Stream `fragments`, then fail with `message`.
    pub fn failing_after(fragments: &[&str], message: &str) -> Self {
        Self {
            trailing_failure: Some(message.to_string()),
            ..Self::new(fragments)
        }
    }

    /// Reject the request before any fragment is produced.
    pub fn refusing(message: &str) -> Self {
        Self {
            refuse: Some(message.to_string()),
            ..Self::new(&[])
        }
    }

    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn stream(&self, request: InferenceRequest) -> Result<FragmentReceiver, ChatError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        if let Some(ref message) = self.refuse {
            return Err(ChatError::Inference(message.clone()));
        }

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let fragments = self.fragments.clone();
        let failure = self.trailing_failure.clone();
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
            if let Some(message) = failure {
                let _ = tx.send(Err(ChatError::Inference(message))).await;
            }
        });
        Ok(rx)
    }
}
