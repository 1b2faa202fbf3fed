//! Error types for the conversation crate.
//!
//! - `SessionError`: onboarding and session bookkeeping failures
//! - `TurnError`: why a turn did not produce an assistant message

use std::fmt;

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session already has a user context; reset it first.
    AlreadyOnboarded,
    /// A required onboarding field was blank.
    InvalidUserContext { field: &'static str },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOnboarded => write!(f, "session already has a user context"),
            Self::InvalidUserContext { field } => {
                write!(f, "invalid user context: {field} must not be blank")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from executing a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// The input was empty or whitespace. Nothing changed.
    EmptyInput,
    /// The session has no user context yet. Nothing changed.
    NotOnboarded,
    /// No pending suggestion at that index. Nothing changed.
    OutOfRange { index: usize, available: usize },
    /// The generator was still rate limited after every attempt.
    RateLimited { attempts: u32 },
    /// The generator failed in a way retrying will not fix.
    GeneratorUnavailable { reason: String },
}

impl TurnError {
    /// Returns true if the turn left the session untouched.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::NotOnboarded | Self::OutOfRange { .. }
        )
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "message is empty"),
            Self::NotOnboarded => write!(f, "session has no user context"),
            Self::OutOfRange { index, available } => {
                write!(
                    f,
                    "suggestion {index} out of range ({available} available)"
                )
            }
            Self::RateLimited { attempts } => {
                write!(f, "generator rate limited after {attempts} attempts")
            }
            Self::GeneratorUnavailable { reason } => {
                write!(f, "generator unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for TurnError {}
