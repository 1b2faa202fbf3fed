//! Conversation workflow for spectrum-compass.
//!
//! This crate provides:
//!
//! - **Session**: message log, suggestion chips and onboarding answers
//! - **Turn Executor**: the submit / select-suggestion protocol with retries
//! - **Response Parser**: splits the `SUGGESTIONS:` directive off answers
//! - **Citations**: deduplicated resource references for each answer
//! - **Session Store**: in-memory sessions with idle expiry

pub mod citation;
pub mod error;
pub mod message;
pub mod response;
pub mod session;
pub mod store;
pub mod turn;

pub use citation::citations_from_passages;
pub use error::{SessionError, TurnError};
pub use message::{Citation, Message, MessageRole};
pub use response::{ParsedResponse, parse_response};
pub use session::{ConversationSession, UserContext};
pub use store::{SessionStore, SharedSession};
pub use turn::{DEFAULT_HISTORY_WINDOW, TurnExecutor, TurnOutcome, TurnState};
