//! Retrieve-then-generate answer chain.
//!
//! The chain retrieves passages for the user's question, renders the
//! persona prompt around them, replays the recent history, and asks the
//! LLM backend for one raw answer. Parsing that answer is the caller's job.

use crate::backend::{LlmBackend, LlmMessage, LlmRequest};
use crate::error::LlmError;
use crate::prompt::PromptTemplate;
use crate::retriever::{Passage, Retriever, UNKNOWN_RESOURCE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Who spoke a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person asking.
    User,
    /// The guide.
    Assistant,
}

/// One prior turn replayed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
}

impl HistoryTurn {
    /// Creates a history turn.
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Everything the generator needs for one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInput {
    /// The user's question.
    pub input: String,
    /// Recent prior turns, oldest first.
    pub history: Vec<HistoryTurn>,
    /// Who is asking (parent, teacher, self-advocate, ...).
    pub role: String,
    /// Age of the autistic person.
    pub age: String,
    /// Where the person lives, if shared.
    pub location: Option<String>,
}

/// A raw answer and the passages it was conditioned on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// Unparsed model output.
    pub answer: String,
    /// Passages supplied as context, in retrieval order.
    pub context: Vec<Passage>,
}

/// Trait for anything that can answer a question with context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produces one raw answer.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` for transient throttling and any other
    /// `LlmError` for failures that retrying will not fix.
    async fn generate(&self, input: &GenerationInput) -> Result<GeneratedAnswer, LlmError>;
}

/// Sampling options for the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainOptions {
    /// Temperature for sampling.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

/// The production answer generator.
pub struct RagChain {
    retriever: Arc<dyn Retriever>,
    backend: Arc<dyn LlmBackend>,
    persona: PromptTemplate,
    options: ChainOptions,
}

impl RagChain {
    /// Creates a chain using the default persona prompt.
    #[must_use]
    pub fn new(retriever: Arc<dyn Retriever>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            retriever,
            backend,
            persona: PromptTemplate::persona(),
            options: ChainOptions::default(),
        }
    }

    /// Sets sampling options.
    #[must_use]
    pub fn with_options(mut self, options: ChainOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the backend request for an input and its retrieved passages.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the persona template cannot be rendered.
    pub fn build_request(
        &self,
        input: &GenerationInput,
        passages: &[Passage],
    ) -> Result<LlmRequest, LlmError> {
        let mut vars = HashMap::new();
        vars.insert("role".to_string(), input.role.clone());
        vars.insert("age".to_string(), input.age.clone());
        if let Some(ref location) = input.location {
            vars.insert("location".to_string(), location.clone());
        }
        vars.insert("context".to_string(), format_context(passages));

        let system = self
            .persona
            .render(&vars)
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let history = input
            .history
            .iter()
            .map(|turn| match turn.speaker {
                Speaker::User => LlmMessage::user(turn.text.clone()),
                Speaker::Assistant => LlmMessage::assistant(turn.text.clone()),
            })
            .collect();

        let mut request = LlmRequest::new(input.input.clone())
            .with_system(system)
            .with_context(history);
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        Ok(request)
    }
}

#[async_trait]
impl AnswerGenerator for RagChain {
    #[instrument(skip(self, input), fields(history = input.history.len()))]
    async fn generate(&self, input: &GenerationInput) -> Result<GeneratedAnswer, LlmError> {
        let passages = self.retriever.retrieve(&input.input).await.map_err(|e| {
            warn!(error = %e, "Retrieval failed");
            LlmError::ProviderUnavailable {
                provider: "retriever".to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!(passages = passages.len(), "Retrieved context");

        let request = self.build_request(input, &passages)?;
        let response = self.backend.generate(&request).await?;

        Ok(GeneratedAnswer {
            answer: response.content,
            context: passages,
        })
    }
}

/// Renders passages as the numbered context block of the persona prompt.
fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let source = p.metadata.source.as_deref().unwrap_or(UNKNOWN_RESOURCE);
            format!("[{}] {}\n{}", i + 1, source, p.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LlmProvider, LlmResponse, MessageRole, TokenUsage};
    use crate::error::RetrievalError;
    use std::sync::Mutex;

    struct FixedRetriever {
        passages: Vec<Passage>,
        fail: bool,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RetrievalError> {
            if self.fail {
                return Err(RetrievalError::SearchFailed {
                    reason: "index offline".to_string(),
                });
            }
            Ok(self.passages.clone())
        }
    }

    struct RecordingBackend {
        reply: Result<String, LlmError>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl RecordingBackend {
        fn replying(reply: Result<String, LlmError>) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for RecordingBackend {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone().map(|content| LlmResponse {
                content,
                usage: TokenUsage::default(),
                model: "test".to_string(),
            })
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::OpenAiCompatible
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn input() -> GenerationInput {
        GenerationInput {
            input: "Where can I find a support group?".to_string(),
            history: vec![
                HistoryTurn::new(Speaker::User, "Hi"),
                HistoryTurn::new(Speaker::Assistant, "Hello! How can I help?"),
            ],
            role: "Parent".to_string(),
            age: "8".to_string(),
            location: None,
        }
    }

    fn passages() -> Vec<Passage> {
        vec![
            Passage::new("Parent groups meet every Tuesday.")
                .with_source("Family Network")
                .with_url("https://example.org/family"),
            Passage::new("Online forums are open to all."),
        ]
    }

    #[tokio::test]
    async fn returns_answer_with_context() {
        let backend = Arc::new(RecordingBackend::replying(Ok(
            "Try the Family Network.\nSUGGESTIONS: A | B | C".to_string(),
        )));
        let chain = RagChain::new(
            Arc::new(FixedRetriever {
                passages: passages(),
                fail: false,
            }),
            backend.clone(),
        );

        let answer = chain.generate(&input()).await.expect("answer");
        assert!(answer.answer.starts_with("Try the Family Network."));
        assert_eq!(answer.context, passages());

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.prompt, "Where can I find a support group?");
        assert_eq!(request.context.len(), 2);
        assert_eq!(request.context[0].role, MessageRole::User);
        assert_eq!(request.context[1].role, MessageRole::Assistant);

        let system = request.system.as_deref().expect("system prompt");
        assert!(system.contains("Role: Parent"));
        assert!(system.contains("Location: Not specified"));
        assert!(system.contains("[1] Family Network\nParent groups meet every Tuesday."));
        assert!(system.contains("[2] Unknown Resource\nOnline forums are open to all."));
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let chain = RagChain::new(
            Arc::new(FixedRetriever {
                passages: passages(),
                fail: false,
            }),
            Arc::new(RecordingBackend::replying(Err(LlmError::RateLimited {
                retry_after_secs: Some(1),
            }))),
        );

        let err = chain.generate(&input()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn retrieval_failure_is_unavailable() {
        let chain = RagChain::new(
            Arc::new(FixedRetriever {
                passages: Vec::new(),
                fail: true,
            }),
            Arc::new(RecordingBackend::replying(Ok("unused".to_string()))),
        );

        let err = chain.generate(&input()).await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderUnavailable { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn build_request_applies_options_and_location() {
        let chain = RagChain::new(
            Arc::new(FixedRetriever {
                passages: Vec::new(),
                fail: false,
            }),
            Arc::new(RecordingBackend::replying(Ok(String::new()))),
        )
        .with_options(ChainOptions {
            temperature: Some(0.2),
            max_tokens: Some(400),
        });

        let mut input = input();
        input.location = Some("Manitoba".to_string());
        let request = chain.build_request(&input, &[]).expect("request");

        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(400));
        let system = request.system.expect("system");
        assert!(system.contains("Location: Manitoba"));
        assert!(system.contains("No matching resources were found."));
    }

    #[test]
    fn blank_role_is_a_configuration_error() {
        let chain = RagChain::new(
            Arc::new(FixedRetriever {
                passages: Vec::new(),
                fail: false,
            }),
            Arc::new(RecordingBackend::replying(Ok(String::new()))),
        );
        let mut input = input();
        input.role = String::new();

        let err = chain.build_request(&input, &[]).unwrap_err();
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }
}
