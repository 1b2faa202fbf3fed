//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`LLM__MODEL`, `SESSION__SECURE_COOKIES`).
//! Every field has a default so a bare environment starts a local server.

use serde::Deserialize;
use spectrum_compass_ai::{ChainOptions, LlmBackendConfig, LlmProvider, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Language model configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Knowledge base configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Turn protocol configuration.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Language model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Which provider to talk to.
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Required for OpenAI.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens per answer.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenAi
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Backend connection settings.
    #[must_use]
    pub fn backend_config(&self) -> LlmBackendConfig {
        LlmBackendConfig {
            provider: self.provider,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    /// Sampling options for the answer chain.
    #[must_use]
    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Knowledge base configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// JSON file of `{text, source, url}` documents.
    #[serde(default = "default_knowledge_base_path")]
    pub knowledge_base_path: PathBuf,

    /// Passages retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_knowledge_base_path() -> PathBuf {
    PathBuf::from("data/knowledge_base.json")
}

fn default_top_k() -> usize {
    spectrum_compass_ai::retriever::DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            knowledge_base_path: default_knowledge_base_path(),
            top_k: default_top_k(),
        }
    }
}

/// Turn protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Prior messages replayed to the model.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Total generator attempts when rate limited.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds to wait between rate-limited attempts.
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,
}

fn default_history_window() -> usize {
    spectrum_compass_conversation::DEFAULT_HISTORY_WINDOW
}

fn default_max_attempts() -> u32 {
    spectrum_compass_ai::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_seconds() -> u64 {
    spectrum_compass_ai::retry::DEFAULT_BACKOFF.as_secs()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_attempts: default_max_attempts(),
            backoff_seconds: default_backoff_seconds(),
        }
    }
}

impl ConversationConfig {
    /// The generator retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_seconds))
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Minutes of inactivity before a session is discarded.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_idle_timeout_minutes() -> i64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
