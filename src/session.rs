use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::events::LearningMode;
use crate::llm::Conversation;

/// State owned by one study session. Passed `&mut` into the dispatcher.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    conversation: Conversation,
    mode: LearningMode,
    /// Successful dispatches since the session started or was cleared
    request_count: u64,
    /// Replies shown to the student
    message_count: u64,
    last_request: Option<Instant>,
    rate_limit_hit: bool,
    started_at: DateTime<Utc>,
}

/// Snapshot for the `/stats` view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub model: String,
    pub mode: LearningMode,
    pub requests: u64,
    pub messages: u64,
    pub rate_limit_hit: bool,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(conversation: Conversation, mode: LearningMode) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            conversation,
            mode,
            request_count: 0,
            message_count: 0,
            last_request: None,
            rate_limit_hit: false,
            started_at: Utc::now(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn model(&self) -> &str {
        &self.conversation.model
    }

    pub fn mode(&self) -> LearningMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LearningMode) {
        self.mode = mode;
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn rate_limit_hit(&self) -> bool {
        self.rate_limit_hit
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    pub(crate) fn record_success(&mut self, completed_at: Instant) {
        self.last_request = Some(completed_at);
        self.request_count += 1;
        self.rate_limit_hit = false;
    }

    pub(crate) fn mark_rate_limited(&mut self) {
        self.rate_limit_hit = true;
    }

    pub fn record_message(&mut self) {
        self.message_count += 1;
    }

    /// Start over with a fresh conversation and zeroed counters
    pub fn clear(&mut self, conversation: Conversation) {
        self.conversation = conversation;
        self.request_count = 0;
        self.message_count = 0;
        self.last_request = None;
        self.rate_limit_hit = false;
        self.started_at = Utc::now();
    }

    /// Continue on another model. History restarts, counters do not.
    pub fn switch_model(&mut self, conversation: Conversation) {
        self.conversation = conversation;
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.conversation.model.clone(),
            mode: self.mode,
            requests: self.request_count,
            messages: self.message_count,
            rate_limit_hit: self.rate_limit_hit,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Conversation::new("gemini-1.5-flash", "sys"), LearningMode::Science)
    }

    #[test]
    fn new_session_starts_empty() {
        let session = session();
        assert_eq!(session.request_count(), 0);
        assert!(!session.rate_limit_hit());
        assert!(session.last_request().is_none());
        assert_eq!(session.model(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn clear_resets_counters_flag_and_conversation() {
        let mut session = session();
        session.conversation_mut().push_exchange("q", "a");
        session.record_success(Instant::now());
        session.mark_rate_limited();
        session.record_message();

        session.clear(Conversation::new("gemini-1.5-flash", "sys"));

        let stats = session.stats();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.messages, 0);
        assert!(!stats.rate_limit_hit);
        assert!(session.last_request().is_none());
        assert!(session.conversation().history().is_empty());
        assert_eq!(stats.mode, LearningMode::Science);
    }

    #[tokio::test]
    async fn switching_model_keeps_counters() {
        let mut session = session();
        session.record_success(Instant::now());

        session.switch_model(Conversation::new("gemini-1.5-pro", "sys"));

        assert_eq!(session.model(), "gemini-1.5-pro");
        assert_eq!(session.request_count(), 1);
        assert!(session.last_request().is_some());
    }
}
