//! Error types for the chat engine.

use arctic_core::error::ArcticError;
use arctic_speech::SpeechError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("conversation was stopped; clear the chat history to continue")]
    SessionAborted,
    #[error("prompt has {tokens} tokens, ceiling is {ceiling}")]
    BudgetExceeded { tokens: usize, ceiling: usize },
    #[error("no user message is waiting for a response")]
    NoPendingTurn,
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("inference error: {0}")]
    Inference(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error(transparent)]
    Voice(#[from] SpeechError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ArcticError> for ChatError {
    fn from(err: ArcticError) -> Self {
        ChatError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Inference(err.to_string())
    }
}
