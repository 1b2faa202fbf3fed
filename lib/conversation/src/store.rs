//! In-memory session store.
//!
//! Each session sits behind its own async mutex so that a turn holds the
//! session for its whole duration. The map lock is only held long enough to
//! look a session up.

use crate::session::ConversationSession;
use chrono::{DateTime, Utc};
use spectrum_compass_core::ConversationSessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// A session shared between requests.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ConversationSessionId, SharedSession>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and stores a fresh session.
    pub async fn create(&self) -> (ConversationSessionId, SharedSession) {
        let session = ConversationSession::new();
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        debug!(session_id = %id, "Session created");
        (id, shared)
    }

    /// Looks up a session.
    pub async fn get(&self, id: ConversationSessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Returns the session for `id` if it exists, otherwise a fresh one.
    pub async fn get_or_create(
        &self,
        id: Option<ConversationSessionId>,
    ) -> (ConversationSessionId, SharedSession) {
        if let Some(id) = id
            && let Some(session) = self.get(id).await
        {
            return (id, session);
        }
        self.create().await
    }

    /// Removes a session, returning it if present.
    pub async fn remove(&self, id: ConversationSessionId) -> Option<SharedSession> {
        self.sessions.write().await.remove(&id)
    }

    /// Removes sessions idle since before `cutoff`. Returns how many went.
    ///
    /// Sessions currently locked by a turn are in use and are kept.
    pub async fn remove_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(session) => !session.is_idle_since(cutoff),
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn create_then_get() {
        let store = SessionStore::new();
        let (id, _) = store.create().await;

        let session = store.get(id).await.expect("stored");
        assert_eq!(session.lock().await.id, id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_creates_fresh_session() {
        let store = SessionStore::new();
        let missing = ConversationSessionId::new();

        let (id, _) = store.get_or_create(Some(missing)).await;
        assert_ne!(id, missing);

        let (again, _) = store.get_or_create(Some(id)).await;
        assert_eq!(again, id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_drops_session() {
        let store = SessionStore::new();
        let (id, _) = store.create().await;
        assert!(store.remove(id).await.is_some());
        assert!(store.get(id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_idle_keeps_recent_and_busy_sessions() {
        let store = SessionStore::new();
        let (idle, _) = store.create().await;
        let (busy, busy_session) = store.create().await;

        let cutoff = Utc::now() + Duration::minutes(1);
        let _guard = busy_session.lock().await;
        assert_eq!(store.remove_idle(cutoff).await, 1);
        assert!(store.get(idle).await.is_none());
        assert!(store.get(busy).await.is_some());

        let past = Utc::now() - Duration::minutes(30);
        assert_eq!(store.remove_idle(past).await, 0);
    }
}
