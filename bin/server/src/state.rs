//! Shared application state.

use crate::config::{ServerConfig, SessionConfig};
use crate::error::StartupError;
use chrono::Utc;
use spectrum_compass_ai::{KeywordRetriever, OpenAiCompatibleBackend, RagChain};
use spectrum_compass_conversation::{SessionStore, TurnExecutor};
use spectrum_compass_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared application state.
pub struct AppState {
    /// Live conversation sessions.
    pub store: SessionStore,
    /// Runs turns against sessions.
    pub executor: TurnExecutor,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(executor: TurnExecutor, session_config: SessionConfig) -> Self {
        Self {
            store: SessionStore::new(),
            executor,
            session_config,
        }
    }

    /// Wires the knowledge base, LLM backend and turn executor from
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the knowledge base cannot be loaded or the
    /// backend configuration is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let retriever = KeywordRetriever::from_path(
            &config.retrieval.knowledge_base_path,
            config.retrieval.top_k,
        )
        .map_err(|e| StartupError::KnowledgeBase {
            details: e.to_string(),
        })?;

        let backend = OpenAiCompatibleBackend::new(config.llm.backend_config()).map_err(|e| {
            StartupError::Backend {
                details: e.to_string(),
            }
        })?;
        tracing::info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            "Configured LLM backend"
        );

        let chain = RagChain::new(Arc::new(retriever), Arc::new(backend))
            .with_options(config.llm.chain_options());
        let executor = TurnExecutor::new(Arc::new(chain))
            .with_retry_policy(config.conversation.retry_policy())
            .with_history_window(config.conversation.history_window);

        Ok(Self::new(executor, config.session.clone()))
    }

    /// Drops sessions idle longer than the configured timeout.
    pub async fn sweep_idle_sessions(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::minutes(self.session_config.idle_timeout_minutes);
        self.store.remove_idle(cutoff).await
    }
}

/// Spawns the periodic idle-session cleanup task.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let interval_secs = state.session_config.cleanup_interval_seconds.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let removed = state.sweep_idle_sessions().await;
            if removed > 0 {
                tracing::debug!(removed_sessions = removed, "Periodic session cleanup");
            }
        }
    })
}
