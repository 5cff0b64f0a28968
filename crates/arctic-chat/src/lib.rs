//! Conversational core of Arctic Vision.
//!
//! Holds per-visitor session state, assembles prompts from the transcript,
//! enforces the prompt token budget and streams replies from the hosted
//! model into the session.

pub mod error;
pub mod guard;
pub mod inference;
pub mod orchestrator;
pub mod prompt;
pub mod replicate;
pub mod session;
pub mod streamer;
pub mod tokenizer;
pub mod voice;

pub use error::ChatError;
pub use guard::{abort_annotation, BudgetVerdict, TokenBudgetGuard, DEFAULT_CEILING};
pub use inference::{FragmentReceiver, InferenceClient, InferenceRequest, MockInferenceClient};
pub use orchestrator::{ChatOrchestrator, TurnOutcome};
pub use prompt::assemble_prompt;
pub use replicate::ReplicateClient;
pub use session::{ChatSession, SessionRegistry, SharedSession};
pub use streamer::ResponseStreamer;
pub use tokenizer::{ApproximateTokenCounter, HfTokenCounter, TokenCounter};
pub use voice::VoiceInput;
