//! Domain error types for server operations.
//!
//! Conversation errors are mapped to user-safe JSON responses here;
//! details only reach the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use spectrum_compass_conversation::{SessionError, TurnError};
use std::fmt;

/// Errors returned by the HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// A turn could not run or did not complete.
    Turn(TurnError),
    /// Onboarding was rejected.
    Session(SessionError),
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self::Turn(e)
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Turn(e) => write!(f, "turn error: {e}"),
            Self::Session(e) => write!(f, "session error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Returns true if the request was turned away before any work ran.
    fn is_rejected(&self) -> bool {
        match self {
            Self::Turn(e) => e.is_rejected(),
            Self::Session(_) => true,
        }
    }

    /// Status code and user-safe message, or `None` for an empty response.
    fn status_and_message(&self) -> (StatusCode, Option<&'static str>) {
        match self {
            Self::Turn(TurnError::EmptyInput) => (StatusCode::NO_CONTENT, None),
            Self::Turn(TurnError::NotOnboarded) => (
                StatusCode::BAD_REQUEST,
                Some("Please tell us a little about yourself first"),
            ),
            Self::Turn(TurnError::OutOfRange { .. }) => {
                (StatusCode::NOT_FOUND, Some("Suggestion not found"))
            }
            Self::Turn(TurnError::RateLimited { .. }) => (
                StatusCode::TOO_MANY_REQUESTS,
                Some("The guide is busy right now. Please try again in a moment."),
            ),
            Self::Turn(TurnError::GeneratorUnavailable { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Some("The guide is unavailable right now. Please try again later."),
            ),
            Self::Session(SessionError::AlreadyOnboarded) => (
                StatusCode::CONFLICT,
                Some("Onboarding is already complete. Start a new chat to change it."),
            ),
            Self::Session(SessionError::InvalidUserContext { .. }) => (
                StatusCode::BAD_REQUEST,
                Some("Role and age are required"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if self.is_rejected() {
            tracing::debug!(error = %self, "Request rejected");
        } else {
            tracing::error!(error = %self, "Request failed");
        }

        match message {
            Some(message) => (status, Json(serde_json::json!({ "error": message }))).into_response(),
            None => status.into_response(),
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The knowledge base could not be loaded.
    KnowledgeBase { details: String },
    /// The LLM backend could not be built.
    Backend { details: String },
    /// The listener could not bind.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::KnowledgeBase { details } => {
                write!(f, "failed to load knowledge base: {details}")
            }
            Self::Backend { details } => write!(f, "failed to create LLM backend: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn turn_errors_map_to_statuses() {
        assert_eq!(status(TurnError::EmptyInput), StatusCode::NO_CONTENT);
        assert_eq!(status(TurnError::NotOnboarded), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(TurnError::OutOfRange {
                index: 4,
                available: 3
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(TurnError::RateLimited { attempts: 3 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(TurnError::GeneratorUnavailable {
                reason: "HTTP 401".to_string()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn session_errors_map_to_statuses() {
        assert_eq!(status(SessionError::AlreadyOnboarded), StatusCode::CONFLICT);
        assert_eq!(
            status(SessionError::InvalidUserContext { field: "age" }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn only_generator_failures_are_logged_as_errors() {
        assert!(ApiError::from(TurnError::EmptyInput).is_rejected());
        assert!(
            ApiError::from(TurnError::OutOfRange {
                index: 0,
                available: 0
            })
            .is_rejected()
        );
        assert!(ApiError::from(SessionError::AlreadyOnboarded).is_rejected());
        assert!(!ApiError::from(TurnError::RateLimited { attempts: 3 }).is_rejected());
        assert!(
            !ApiError::from(TurnError::GeneratorUnavailable {
                reason: "down".to_string()
            })
            .is_rejected()
        );
    }

    #[test]
    fn messages_do_not_leak_details() {
        let err = ApiError::from(TurnError::GeneratorUnavailable {
            reason: "sk-secret rejected".to_string(),
        });
        let (_, message) = err.status_and_message();
        assert!(!message.expect("message").contains("sk-secret"));
    }

    #[test]
    fn startup_error_display() {
        let err = StartupError::Bind {
            addr: "0.0.0.0:80".to_string(),
            details: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:80"));
    }
}
