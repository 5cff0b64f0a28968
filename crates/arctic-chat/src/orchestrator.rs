//! Chat orchestrator: one conversational turn from user text to streamed reply.
//!
//! Wires prompt assembly, the token budget guard and the response streamer.

use std::sync::Arc;

use tokio::sync::mpsc;

use arctic_core::config::ModelConfig;

use crate::error::ChatError;
use crate::guard::TokenBudgetGuard;
use crate::inference::{InferenceClient, InferenceRequest};
use crate::prompt::assemble_prompt;
use crate::session::ChatSession;
use crate::streamer::ResponseStreamer;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model replied with `content`.
    Completed { content: String },
    /// The prompt reached the token ceiling; `message` is the annotation now
    /// shown in place of a reply.
    Aborted {
        message: String,
        tokens: usize,
        ceiling: usize,
    },
}

pub struct ChatOrchestrator {
    streamer: ResponseStreamer,
    guard: TokenBudgetGuard,
    model: ModelConfig,
}

impl ChatOrchestrator {
    pub fn new(client: Arc<dyn InferenceClient>, guard: TokenBudgetGuard, model: ModelConfig) -> Self {
        Self {
            streamer: ResponseStreamer::new(client),
            guard,
            model,
        }
    }

    pub fn guard(&self) -> &TokenBudgetGuard {
        &self.guard
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Append `text` as a user turn and generate the reply.
    pub async fn submit_user_message(
        &self,
        session: &mut ChatSession,
        text: &str,
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if session.is_aborted() {
            return Err(ChatError::SessionAborted);
        }
        session.push_user(text);
        self.respond(session, sink).await
    }

    /// Generate a reply to the pending user turn.
    pub async fn respond(
        &self,
        session: &mut ChatSession,
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<TurnOutcome, ChatError> {
        if session.is_aborted() {
            return Err(ChatError::SessionAborted);
        }
        if !session.needs_response() {
            return Err(ChatError::NoPendingTurn);
        }

        let prompt = assemble_prompt(session.messages());
        let prompt_tokens = match self.guard.enforce(session, &prompt) {
            Ok(tokens) => tokens,
            Err(ChatError::BudgetExceeded { tokens, ceiling }) => {
                let message = session.last_assistant_content().unwrap_or_default().to_string();
                return Ok(TurnOutcome::Aborted {
                    message,
                    tokens,
                    ceiling,
                });
            }
            Err(e) => return Err(e),
        };

        let request = InferenceRequest::new(&self.model, prompt, &session.controls);
        let content = self.streamer.stream_into(session, request, sink).await?;

        tracing::info!(
            session_id = %session.id,
            prompt_tokens,
            response_chars = content.len(),
            temperature = session.controls.temperature,
            top_p = session.controls.top_p,
            "Chat turn completed"
        );
        Ok(TurnOutcome::Completed { content })
    }
}

// =============================================================================
// Tests
// =============================================================================
