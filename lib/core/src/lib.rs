//! Core domain types and utilities for the spectrum-compass service.
//!
//! This crate provides the identifiers and error-handling foundation shared
//! by the AI, conversation, and server crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConversationSessionId, MessageId, ParseIdError};
