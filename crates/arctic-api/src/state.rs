//! Application state shared across all route handlers.
//!
//! AppState holds the session registry and the services that act on
//! sessions. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use arctic_analysis::FileAnalyzer;
use arctic_chat::{
    ChatOrchestrator, InferenceClient, SessionRegistry, TokenBudgetGuard, TokenCounter, VoiceInput,
};
use arctic_core::config::ArcticConfig;
use arctic_core::types::SessionControls;
use arctic_speech::SpeechToText;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed at startup.
    pub config: Arc<ArcticConfig>,
    /// Live chat sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Prompt assembly, budget guard and streaming.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Upload analysis and PDF export.
    pub analyzer: Arc<FileAnalyzer>,
    /// Microphone recordings to user turns.
    pub voice: Arc<VoiceInput>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services from configuration and the external clients.
    pub fn new(
        config: ArcticConfig,
        inference: Arc<dyn InferenceClient>,
        counter: Arc<dyn TokenCounter>,
        speech: Arc<dyn SpeechToText>,
    ) -> Self {
        let controls = SessionControls {
            temperature: config.model.default_temperature,
            top_p: config.model.default_top_p,
        };
        let sessions = SessionRegistry::new(
            &config.chat.greeting,
            controls,
            config.chat.session_timeout_minutes,
        );
        let guard = TokenBudgetGuard::new(counter, config.chat.max_prompt_tokens);
        let orchestrator = ChatOrchestrator::new(inference, guard, config.model.clone());
        let analyzer = FileAnalyzer::new(&config.analysis, &config.export);
        let voice = VoiceInput::new(&config.voice, speech);

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            orchestrator: Arc::new(orchestrator),
            analyzer: Arc::new(analyzer),
            voice: Arc::new(voice),
            start_time: Instant::now(),
        }
    }
}
