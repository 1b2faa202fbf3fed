//! The turn protocol.
//!
//! A turn appends the user's message, asks the generator for an answer over
//! a bounded history window, and on success appends the cleaned answer with
//! its citations and suggestion chips. On failure the user's message stays
//! last and no suggestions are offered.

use crate::citation::citations_from_passages;
use crate::error::TurnError;
use crate::message::{Citation, Message};
use crate::response::parse_response;
use crate::session::ConversationSession;
use serde::{Deserialize, Serialize};
use spectrum_compass_ai::{AnswerGenerator, GenerationInput, RetryPolicy};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Number of prior messages replayed to the generator by default.
pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Lifecycle of a single turn, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No turn running.
    Idle,
    /// Waiting on the generator.
    InFlight,
    /// An assistant message was appended.
    Completed,
    /// The generator failed; only the user message was appended.
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a successful turn produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The answer shown to the user, without the suggestion directive.
    pub answer: String,
    /// Deduplicated resources the answer drew on.
    pub citations: Vec<Citation>,
    /// Follow-up questions now pending on the session.
    pub suggestions: Vec<String>,
    /// Generator attempts it took.
    pub attempts: u32,
}

/// Runs turns against sessions.
#[derive(Clone)]
pub struct TurnExecutor {
    generator: Arc<dyn AnswerGenerator>,
    retry: RetryPolicy,
    history_window: usize,
}

impl TurnExecutor {
    /// Creates an executor with the default retry policy and history window.
    #[must_use]
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            generator,
            retry: RetryPolicy::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets how many prior messages are replayed to the generator.
    #[must_use]
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    /// Returns the history window.
    #[must_use]
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Runs one turn for `text`.
    ///
    /// # Errors
    ///
    /// `NotOnboarded` and `EmptyInput` leave the session untouched.
    /// `RateLimited` and `GeneratorUnavailable` leave the user message
    /// appended with no reply and no suggestions.
    #[instrument(skip(self, session, text), fields(session_id = %session.id))]
    pub async fn submit_turn(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let Some(context) = session.user_context().cloned() else {
            return Err(TurnError::NotOnboarded);
        };
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        // Window over prior messages only; the new input travels separately.
        let history = session.history_window(self.history_window);
        session.add_message(Message::user(text));
        session.clear_suggestions();

        info!(
            state = %TurnState::InFlight,
            history = history.len(),
            "Turn started"
        );

        let input = GenerationInput {
            input: text.to_string(),
            history,
            role: context.role,
            age: context.age,
            location: context.location,
        };

        let outcome = self.retry.run(|| self.generator.generate(&input)).await;
        let attempts = outcome.attempts;

        let generated = match outcome.result {
            Ok(generated) => generated,
            Err(e) => {
                warn!(
                    state = %TurnState::Failed,
                    error = %e,
                    attempts,
                    "Turn failed"
                );
                debug!(state = %TurnState::Idle, "Session ready for input");
                return Err(if e.is_retryable() {
                    TurnError::RateLimited { attempts }
                } else {
                    TurnError::GeneratorUnavailable {
                        reason: e.to_string(),
                    }
                });
            }
        };

        let parsed = parse_response(&generated.answer);
        let citations = citations_from_passages(&generated.context);
        debug!(
            suggestions = parsed.suggestions.len(),
            citations = citations.len(),
            "Parsed answer"
        );

        session.add_message(Message::assistant(
            parsed.clean_answer.clone(),
            citations.clone(),
        ));
        session.set_suggestions(parsed.suggestions.clone());

        info!(state = %TurnState::Completed, attempts, "Turn completed");
        debug!(state = %TurnState::Idle, "Session ready for input");

        Ok(TurnOutcome {
            answer: parsed.clean_answer,
            citations,
            suggestions: parsed.suggestions,
            attempts,
        })
    }

    /// Runs a turn using the pending suggestion at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such suggestion; otherwise as
    /// [`submit_turn`](Self::submit_turn).
    pub async fn select_suggestion(
        &self,
        session: &mut ConversationSession,
        index: usize,
    ) -> Result<TurnOutcome, TurnError> {
        let pending = session.pending_suggestions();
        let Some(text) = pending.get(index).cloned() else {
            return Err(TurnError::OutOfRange {
                index,
                available: pending.len(),
            });
        };
        debug!(session_id = %session.id, index, "Suggestion selected");
        self.submit_turn(session, &text).await
    }
}
