//! AI building blocks for spectrum-compass.
//!
//! - **Backend**: the `LlmBackend` trait and an OpenAI-compatible client
//! - **Retriever**: knowledge base search behind the `Retriever` trait
//! - **Prompt**: the persona template and the `SUGGESTIONS:` contract
//! - **Chain**: retrieve-then-generate, exposed as `AnswerGenerator`
//! - **Retry**: fixed-backoff retry for rate-limited calls

pub mod backend;
pub mod chain;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod retriever;
pub mod retry;

pub use backend::{LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse};
pub use chain::{
    AnswerGenerator, ChainOptions, GeneratedAnswer, GenerationInput, HistoryTurn, RagChain,
    Speaker,
};
pub use error::{LlmError, PromptError, RetrievalError};
pub use openai::OpenAiCompatibleBackend;
pub use prompt::{PromptTemplate, SUGGESTIONS_DELIMITER, SUGGESTIONS_MARKER};
pub use retriever::{KeywordRetriever, Passage, PassageMetadata, Retriever, UNKNOWN_RESOURCE};
pub use retry::{RetryOutcome, RetryPolicy};
