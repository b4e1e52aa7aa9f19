//! Session registry
//!
//! Each session sits behind its own async mutex: a caller holds the lock
//! for the whole utterance, so turns for one session are processed one at a
//! time while different sessions run concurrently.

use super::ConversationSession;
use sdk::errors::EngineError;
use sdk::types::Meeting;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub type SessionHandle = Arc<Mutex<ConversationSession>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its opaque id (`meeting_<hex>`)
    pub async fn create(&self, meeting: Option<Meeting>) -> String {
        let id = format!("meeting_{}", uuid::Uuid::new_v4().simple());
        let session = ConversationSession::new(id.clone(), meeting);
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        tracing::debug!(session = %id, "Session created");
        id
    }

    pub async fn get(&self, id: &str) -> Result<SessionHandle, EngineError> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(Arc::clone)
            .ok_or_else(|| EngineError::UnknownSession(id.to_string()))
    }

    /// Drop a session with its history and any pending proposal
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "Session destroyed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let registry = SessionRegistry::new();
        let id = registry.create(None).await;
        assert!(id.starts_with("meeting_"));
        assert_eq!(registry.len().await, 1);

        let handle = registry.get(&id).await.unwrap();
        assert_eq!(handle.lock().await.id(), id);

        assert!(registry.destroy(&id).await);
        assert!(!registry.destroy(&id).await);
        assert!(matches!(
            registry.get(&id).await,
            Err(EngineError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.create(None).await;
        let b = registry.create(None).await;
        assert_ne!(a, b);
        assert!(!registry.is_empty().await);
    }
}
