//! Per-visitor chat session state and the in-memory session registry.
//!
//! A session holds the ordered transcript, the sampling controls and the
//! abort flag raised by the token budget guard. Sessions live only in memory
//! and are pruned after a period of inactivity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use arctic_core::types::{ExportedDocument, Message, Role, SessionControls};

use crate::error::ChatError;

// =============================================================================
// ChatSession
// =============================================================================

/// State of one visitor's conversation.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub controls: SessionControls,
    /// Most recent analysis report, served as `results.pdf`.
    pub analysis_report: Option<ExportedDocument>,
    /// PNG charts of the most recent analysis.
    pub analysis_charts: Vec<ExportedDocument>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    messages: Vec<Message>,
    aborted: bool,
    greeting: String,
}

impl ChatSession {
    /// Create a session whose transcript holds only the greeting.
    pub fn new(greeting: &str, controls: SessionControls) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            controls,
            analysis_report: None,
            analysis_charts: Vec::new(),
            created_at: now,
            last_active: now,
            messages: vec![Message::assistant(greeting)],
            aborted: false,
            greeting: greeting.to_string(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Reset the transcript to the greeting and lift the abort flag.
    ///
    /// Sampling controls are left as they are.
    pub fn clear_history(&mut self) {
        self.messages = vec![Message::assistant(self.greeting.as_str())];
        self.aborted = false;
        self.touch();
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(Message::user(text));
        self.touch();
    }

    /// Append an empty assistant message that streaming fills in.
    pub fn begin_assistant(&mut self) {
        self.messages.push(Message::assistant(""));
    }

    /// Append a fragment to the last message.
    pub fn append_to_last(&mut self, fragment: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(fragment);
        }
        self.touch();
    }

    /// Replace the last assistant message with `text` (or append one after a
    /// user turn) and mark the session aborted.
    pub fn annotate_abort(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content = text.to_string(),
            _ => self.messages.push(Message::assistant(text)),
        }
        self.aborted = true;
        self.touch();
    }

    pub fn last_assistant_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// True when the last message is a user turn awaiting a reply.
    pub fn needs_response(&self) -> bool {
        matches!(self.messages.last(), Some(m) if m.role == Role::User)
    }

    pub fn set_controls(&mut self, controls: SessionControls) -> Result<(), ChatError> {
        controls.validate()?;
        self.controls = controls;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_idle(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_active > timeout
    }
}

// =============================================================================
// SessionRegistry
// =============================================================================

/// A session shared between request handlers. The mutex serializes
/// interactions on one session.
pub type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// In-memory map of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    greeting: String,
    default_controls: SessionControls,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(greeting: &str, default_controls: SessionControls, timeout_minutes: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            greeting: greeting.to_string(),
            default_controls,
            idle_timeout: Duration::minutes(i64::from(timeout_minutes)),
        }
    }

    /// Create a fresh session, pruning idle ones first.
    pub fn create(&self) -> Result<(Uuid, SharedSession), ChatError> {
        let pruned = self.prune_idle(self.idle_timeout)?;
        if pruned > 0 {
            tracing::info!(pruned, "Pruned idle chat sessions");
        }

        let session = ChatSession::new(&self.greeting, self.default_controls);
        let id = session.id;
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.write()?.insert(id, Arc::clone(&shared));
        tracing::debug!(session_id = %id, "Chat session created");
        Ok((id, shared))
    }

    pub fn get(&self, id: Uuid) -> Result<SharedSession, ChatError> {
        self.read()?
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), ChatError> {
        self.write()?
            .remove(&id)
            .map(|_| ())
            .ok_or(ChatError::SessionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions inactive for longer than `timeout`. Sessions currently
    /// locked by a request are in use and never pruned.
    pub fn prune_idle(&self, timeout: Duration) -> Result<usize, ChatError> {
        let now = Utc::now();
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, shared| match shared.try_lock() {
            Ok(session) => !session.is_idle(timeout, now),
            Err(_) => true,
        });
        Ok(before - sessions.len())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, SharedSession>>, ChatError> {
        self.sessions
            .read()
            .map_err(|e| ChatError::Internal(format!("session lock poisoned: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, SharedSession>>, ChatError> {
        self.sessions
            .write()
            .map_err(|e| ChatError::Internal(format!("session lock poisoned: {}", e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
