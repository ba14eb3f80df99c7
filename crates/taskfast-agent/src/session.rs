//! Per-conversation dialogue state storage.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use crate::error::AgentError;
use crate::types::Session;

/// Load/save seam for conversation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, AgentError>;
    async fn save(&self, session: Session) -> Result<(), AgentError>;
}

/// Process-local session store.
///
/// Sessions idle longer than the TTL read as absent and are dropped by
/// [`purge_expired`](Self::purge_expired). When the store is full the least
/// recently updated session is evicted.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Option<Duration>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    /// `ttl_minutes == 0` disables expiry.
    pub fn new(ttl_minutes: u32, max_sessions: usize) -> Self {
        let ttl = (ttl_minutes > 0).then(|| Duration::minutes(i64::from(ttl_minutes)));
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>, AgentError> {
        self.sessions
            .lock()
            .map_err(|e| AgentError::Session(format!("lock poisoned: {e}")))
    }

    fn is_expired(&self, session: &Session) -> bool {
        self.ttl
            .is_some_and(|ttl| Utc::now() - session.updated_at > ttl)
    }

    /// Drops every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize, AgentError> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
        Ok(purged)
    }

    pub fn len(&self) -> Result<usize, AgentError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AgentError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<Session>, AgentError> {
        let mut sessions = self.lock()?;
        match sessions.get(conversation_id) {
            Some(session) if self.is_expired(session) => {
                sessions.remove(conversation_id);
                debug!(conversation_id, "session expired");
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, mut session: Session) -> Result<(), AgentError> {
        session.touch();
        let mut sessions = self.lock()?;
        let is_new = !sessions.contains_key(&session.conversation_id);
        if is_new && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.updated_at)
                .map(|s| s.conversation_id.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                debug!(conversation_id = %oldest, "session evicted");
            }
        }
        sessions.insert(session.conversation_id.clone(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DialogueState, Intent, SlotName};

    #[tokio::test]
    async fn test_save_then_get() {
        let store = InMemorySessionStore::new(30, 10);
        let mut session = Session::new("c1");
        session.intent = Some(Intent::AddTask);
        session.state = DialogueState::AwaitingSlot(SlotName::Title);
        store.save(session).await.unwrap();

        let loaded = store.get("c1").await.unwrap().unwrap();
        assert_eq!(loaded.intent, Some(Intent::AddTask));
        assert_eq!(loaded.state.pending_slot(), Some(SlotName::Title));
        assert!(store.get("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let store = InMemorySessionStore::new(1, 10);
        let mut session = Session::new("stale");
        session.intent = Some(Intent::ListTasks);
        store.save(session).await.unwrap();

        // Backdate past the TTL.
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut("stale").unwrap().updated_at = Utc::now() - Duration::minutes(5);
        }
        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemorySessionStore::new(1, 10);
        store.save(Session::new("old")).await.unwrap();
        store.save(Session::new("fresh")).await.unwrap();
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut("old").unwrap().updated_at = Utc::now() - Duration::minutes(2);
        }
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = InMemorySessionStore::new(0, 10);
        store.save(Session::new("c")).await.unwrap();
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut("c").unwrap().updated_at = Utc::now() - Duration::days(365);
        }
        assert!(store.get("c").await.unwrap().is_some());
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_store_evicts_least_recent() {
        let store = InMemorySessionStore::new(30, 2);
        store.save(Session::new("a")).await.unwrap();
        store.save(Session::new("b")).await.unwrap();
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions.get_mut("a").unwrap().updated_at = Utc::now() - Duration::minutes(10);
        }
        store.save(Session::new("c")).await.unwrap();

        assert_eq!(store.len().unwrap(), 2);
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resaving_existing_session_does_not_evict() {
        let store = InMemorySessionStore::new(30, 1);
        store.save(Session::new("only")).await.unwrap();
        store.save(Session::new("only")).await.unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
