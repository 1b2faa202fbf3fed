//! Conversation session state.
//!
//! A session owns the message log, the pending suggestion chips and the
//! onboarding answers for one visitor. Turns are driven by the
//! [`TurnExecutor`](crate::turn::TurnExecutor); this type only enforces the
//! bookkeeping invariants.

use crate::error::SessionError;
use crate::message::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spectrum_compass_ai::{HistoryTurn, Speaker};
use spectrum_compass_core::ConversationSessionId;

/// Onboarding answers used to tailor every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Who is asking (parent, teacher, self-advocate, ...).
    pub role: String,
    /// Age of the autistic person.
    pub age: String,
    /// Where the person lives, if shared.
    #[serde(default)]
    pub location: Option<String>,
}

impl UserContext {
    /// Creates a user context, trimming every field. A blank location is
    /// treated as not shared.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUserContext` if role or age is blank.
    pub fn new(
        role: impl Into<String>,
        age: impl Into<String>,
        location: Option<String>,
    ) -> Result<Self, SessionError> {
        let role = role.into().trim().to_string();
        let age = age.into().trim().to_string();
        if role.is_empty() {
            return Err(SessionError::InvalidUserContext { field: "role" });
        }
        if age.is_empty() {
            return Err(SessionError::InvalidUserContext { field: "age" });
        }
        let location = location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        Ok(Self {
            role,
            age,
            location,
        })
    }
}

/// One visitor's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Unique session identifier.
    pub id: ConversationSessionId,
    messages: Vec<Message>,
    pending_suggestions: Vec<String>,
    user_context: Option<UserContext>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last touched.
    pub last_active_at: DateTime<Utc>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationSessionId::new(),
            messages: Vec::new(),
            pending_suggestions: Vec::new(),
            user_context: None,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Suggestion chips offered after the last successful turn.
    #[must_use]
    pub fn pending_suggestions(&self) -> &[String] {
        &self.pending_suggestions
    }

    /// The onboarding answers, if given.
    #[must_use]
    pub fn user_context(&self) -> Option<&UserContext> {
        self.user_context.as_ref()
    }

    /// Returns true once onboarding is complete.
    #[must_use]
    pub fn is_onboarded(&self) -> bool {
        self.user_context.is_some()
    }

    /// Records onboarding answers.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyOnboarded` if a context is already set.
    pub fn set_user_context(&mut self, context: UserContext) -> Result<(), SessionError> {
        if self.user_context.is_some() {
            return Err(SessionError::AlreadyOnboarded);
        }
        self.user_context = Some(context);
        self.touch();
        Ok(())
    }

    /// Clears messages, suggestions and the user context. Idempotent.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending_suggestions.clear();
        self.user_context = None;
        self.touch();
    }

    /// The last `window` messages, oldest first, as generator history.
    #[must_use]
    pub fn history_window(&self, window: usize) -> Vec<HistoryTurn> {
        let start = self.messages.len().saturating_sub(window);
        self.messages[start..]
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    MessageRole::User => Speaker::User,
                    MessageRole::Assistant => Speaker::Assistant,
                };
                HistoryTurn::new(speaker, m.content.clone())
            })
            .collect()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the last message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns true if the session has been idle since before `cutoff`.
    #[must_use]
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_active_at < cutoff
    }

    pub(crate) fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    pub(crate) fn clear_suggestions(&mut self) {
        self.pending_suggestions.clear();
    }

    pub(crate) fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.pending_suggestions = suggestions;
    }

    fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn parent() -> UserContext {
        UserContext::new("Parent", "7", None).expect("context")
    }

    #[test]
    fn session_creation() {
        let session = ConversationSession::new();
        assert!(session.messages().is_empty());
        assert!(session.pending_suggestions().is_empty());
        assert!(!session.is_onboarded());
    }

    #[test]
    fn user_context_trims_and_validates() {
        let ctx = UserContext::new(" Teacher ", " 10 ", Some("  ".to_string())).expect("ctx");
        assert_eq!(ctx.role, "Teacher");
        assert_eq!(ctx.age, "10");
        assert_eq!(ctx.location, None);

        assert_eq!(
            UserContext::new("", "10", None).unwrap_err(),
            SessionError::InvalidUserContext { field: "role" }
        );
        assert_eq!(
            UserContext::new("Parent", " ", None).unwrap_err(),
            SessionError::InvalidUserContext { field: "age" }
        );
    }

    #[test]
    fn onboarding_happens_once() {
        let mut session = ConversationSession::new();
        session.set_user_context(parent()).expect("first");
        assert!(session.is_onboarded());
        assert_eq!(
            session.set_user_context(parent()).unwrap_err(),
            SessionError::AlreadyOnboarded
        );
    }

    #[test]
    fn reset_clears_everything_and_is_idempotent() {
        let mut session = ConversationSession::new();
        session.set_user_context(parent()).expect("ctx");
        session.add_message(Message::user("Hi"));
        session.set_suggestions(vec!["More?".to_string()]);

        session.reset();
        assert!(session.messages().is_empty());
        assert!(session.pending_suggestions().is_empty());
        assert!(session.user_context().is_none());

        session.reset();
        assert!(session.messages().is_empty());
        assert!(session.user_context().is_none());
    }

    #[test]
    fn history_window_takes_most_recent_in_order() {
        let mut session = ConversationSession::new();
        for i in 0..5 {
            session.add_message(Message::user(format!("q{i}")));
            session.add_message(Message::assistant(format!("a{i}"), Vec::new()));
        }

        let history = session.history_window(4);
        let texts: Vec<&str> = history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q3", "a3", "q4", "a4"]);
        assert_eq!(history[0].speaker, Speaker::User);
        assert_eq!(history[1].speaker, Speaker::Assistant);
    }

    #[test]
    fn history_window_edges() {
        let mut session = ConversationSession::new();
        assert!(session.history_window(4).is_empty());

        session.add_message(Message::user("only"));
        assert_eq!(session.history_window(4).len(), 1);
        assert!(session.history_window(0).is_empty());
    }

    #[test]
    fn idle_detection() {
        let session = ConversationSession::new();
        assert!(!session.is_idle_since(session.last_active_at - Duration::minutes(1)));
        assert!(session.is_idle_since(session.last_active_at + Duration::minutes(1)));
    }
}
