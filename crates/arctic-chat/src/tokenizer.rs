//! Token counting for the prompt budget.
//!
//! Production uses the Llama tokenizer loaded from a HuggingFace
//! `tokenizer.json`. Without one, a word-piece approximation keeps the
//! service usable.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tokenizers::Tokenizer;

use crate::error::ChatError;

/// Counts the tokens a piece of text occupies in the model's vocabulary.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, ChatError>;
}

// =============================================================================
// HfTokenCounter
// =============================================================================

/// Counter backed by a HuggingFace tokenizer file.
///
/// The file is read on the first call and the result (including a load
/// failure) is kept for the rest of the process.
pub struct HfTokenCounter {
    path: PathBuf,
    tokenizer: OnceLock<Result<Tokenizer, String>>,
}

impl HfTokenCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokenizer: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tokenizer(&self) -> Result<&Tokenizer, ChatError> {
        self.tokenizer
            .get_or_init(|| {
                let loaded = Tokenizer::from_file(&self.path).map_err(|e| {
                    format!("failed to load {}: {}", self.path.display(), e)
                });
                match &loaded {
                    Ok(_) => tracing::info!(path = %self.path.display(), "Loaded tokenizer"),
                    Err(e) => tracing::error!(error = %e, "Tokenizer unavailable"),
                }
                loaded
            })
            .as_ref()
            .map_err(|e| ChatError::Tokenizer(e.clone()))
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize, ChatError> {
        let encoding = self
            .tokenizer()?
            .encode(text, false)
            .map_err(|e| ChatError::Tokenizer(format!("tokenization failed: {}", e)))?;
        Ok(encoding.len())
    }
}

// =============================================================================
// ApproximateTokenCounter
// =============================================================================

/// Heuristic counter: every punctuation character is one token and every
/// alphanumeric word is one token per four characters, rounded up.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproximateTokenCounter;

impl TokenCounter for ApproximateTokenCounter {
    fn count(&self, text: &str) -> Result<usize, ChatError> {
        let mut tokens = 0;
        let mut word_len = 0usize;
        for c in text.chars() {
            if c.is_alphanumeric() {
                word_len += 1;
                continue;
            }
            tokens += word_len.div_ceil(4);
            word_len = 0;
            if !c.is_whitespace() {
                tokens += 1;
            }
        }
        Ok(tokens + word_len.div_ceil(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_words() {
        let counter = ApproximateTokenCounter;
        assert_eq!(counter.count("").unwrap(), 0);
        assert_eq!(counter.count("hi").unwrap(), 1);
        assert_eq!(counter.count("hello world").unwrap(), 4);
        assert_eq!(counter.count("abcd abcd abcd").unwrap(), 3);
    }

    #[test]
    fn test_approximate_punctuation() {
        let counter = ApproximateTokenCounter;
        assert_eq!(counter.count("hi!").unwrap(), 2);
        assert_eq!(counter.count("user\nWhat?\nassistant\n").unwrap(), 6);
    }

    #[test]
    fn test_approximate_is_monotonic_in_appended_text() {
        let counter = ApproximateTokenCounter;
        let short = counter.count("user\nTell me about Snowflake").unwrap();
        let long = counter
            .count("user\nTell me about Snowflake\nassistant\nIt is a company.")
            .unwrap();
        assert!(long > short);
    }

    #[test]
    fn test_hf_counter_missing_file() {
        let counter = HfTokenCounter::new("/nonexistent/tokenizer.json");
        let first = counter.count("hello");
        assert!(matches!(first, Err(ChatError::Tokenizer(_))));
        // The failure is cached rather than retried.
        let second = counter.count("hello");
        assert!(matches!(second, Err(ChatError::Tokenizer(_))));
        assert_eq!(counter.path(), Path::new("/nonexistent/tokenizer.json"));
    }
}
