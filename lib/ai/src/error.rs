//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Low-level LLM backend operations
//! - `RetrievalError`: Knowledge base loading and search
//! - `PromptError`: Prompt template operations

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Credentials were rejected by the provider.
    Unauthorized { provider: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns true if the same request may succeed when retried later.
    ///
    /// Only rate limiting is retryable; every other failure is treated as
    /// permanent for the current turn.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::Unauthorized { provider } => {
                write!(f, "LLM provider '{provider}' rejected the credentials")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from knowledge base retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The knowledge base file could not be read.
    KnowledgeBaseUnreadable { path: String, reason: String },
    /// The knowledge base contents were malformed.
    InvalidDocuments { reason: String },
    /// A search against the index failed.
    SearchFailed { reason: String },
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KnowledgeBaseUnreadable { path, reason } => {
                write!(f, "cannot read knowledge base '{path}': {reason}")
            }
            Self::InvalidDocuments { reason } => {
                write!(f, "invalid knowledge base documents: {reason}")
            }
            Self::SearchFailed { reason } => {
                write!(f, "knowledge base search failed: {reason}")
            }
        }
    }
}

impl std::error::Error for RetrievalError {}

/// Errors from prompt operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Missing required variable.
    MissingVariable { template: String, variable: String },
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVariable { template, variable } => {
                write!(
                    f,
                    "missing required variable '{variable}' in template '{template}'"
                )
            }
        }
    }
}

impl std::error::Error for PromptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "openai".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("openai"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn rate_limited_display_includes_delay() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(20),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 20s");
        assert_eq!(
            LlmError::RateLimited {
                retry_after_secs: None
            }
            .to_string(),
            "rate limited"
        );
    }

    #[test]
    fn only_rate_limiting_is_retryable() {
        assert!(
            LlmError::RateLimited {
                retry_after_secs: None
            }
            .is_retryable()
        );
        assert!(
            !LlmError::Unauthorized {
                provider: "openai".to_string()
            }
            .is_retryable()
        );
        assert!(!LlmError::Timeout.is_retryable());
        assert!(
            !LlmError::InvalidConfig {
                reason: "no api key".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn retrieval_error_display() {
        let err = RetrievalError::KnowledgeBaseUnreadable {
            path: "kb.json".to_string(),
            reason: "not found".to_string(),
        };
        assert!(err.to_string().contains("kb.json"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn prompt_error_display() {
        let err = PromptError::MissingVariable {
            template: "persona".to_string(),
            variable: "role".to_string(),
        };
        assert!(err.to_string().contains("role"));
        assert!(err.to_string().contains("persona"));
    }
}
