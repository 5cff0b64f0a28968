//! Token budget guard: stops the conversation once the assembled prompt
//! reaches the ceiling.

use std::sync::Arc;

use crate::error::ChatError;
use crate::session::ChatSession;
use crate::tokenizer::TokenCounter;

/// Default prompt ceiling in tokens.
pub const DEFAULT_CEILING: usize = 1500;

/// Outcome of measuring a prompt against the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    WithinBudget { tokens: usize },
    Exceeded { tokens: usize, ceiling: usize },
}

/// Text shown in place of a reply when the ceiling is reached.
pub fn abort_annotation(ceiling: usize) -> String {
    format!(
        "Conversation length too long. Please keep it under {} tokens.",
        ceiling
    )
}

pub struct TokenBudgetGuard {
    counter: Arc<dyn TokenCounter>,
    ceiling: usize,
}

impl TokenBudgetGuard {
    pub fn new(counter: Arc<dyn TokenCounter>, ceiling: usize) -> Self {
        Self { counter, ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Measure `prompt`. A count equal to the ceiling already exceeds it.
    pub fn check(&self, prompt: &str) -> Result<BudgetVerdict, ChatError> {
        let tokens = self.counter.count(prompt)?;
        if tokens >= self.ceiling {
            Ok(BudgetVerdict::Exceeded {
                tokens,
                ceiling: self.ceiling,
            })
        } else {
            Ok(BudgetVerdict::WithinBudget { tokens })
        }
    }

    /// Check `prompt` and, when over budget, annotate and abort the session.
    ///
    /// Returns the token count when the prompt fits.
    pub fn enforce(&self, session: &mut ChatSession, prompt: &str) -> Result<usize, ChatError> {
        match self.check(prompt)? {
            BudgetVerdict::WithinBudget { tokens } => Ok(tokens),
            BudgetVerdict::Exceeded { tokens, ceiling } => {
                tracing::warn!(
                    session_id = %session.id,
                    tokens,
                    ceiling,
                    "Prompt over token budget, stopping conversation"
                );
                session.annotate_abort(&abort_annotation(ceiling));
                Err(ChatError::BudgetExceeded { tokens, ceiling })
            }
        }
    }
}
