use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::retrieval::VectorIndex;
use crate::style::StyleDescriptor;

/// A built document set. Immutable once stored; generation only reads it.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub index: VectorIndex,
    pub style: StyleDescriptor,
}

impl Session {
    pub fn new(sources: Vec<String>, index: VectorIndex, style: StyleDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sources,
            index,
            style,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            sources: self.sources.clone(),
            chunk_count: self.index.len(),
            embedding_dimension: self.index.dimension(),
            style: self.style,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub chunk_count: usize,
    pub embedding_dimension: usize,
    pub style: StyleDescriptor,
}

/// In-memory session registry. Nothing outlives the process.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// True when a session was removed.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = SessionStore::new();
        let session = store
            .insert(Session::new(
                vec!["job_description".to_string()],
                VectorIndex::default(),
                StyleDescriptor::default(),
            ))
            .await;

        let fetched = store.get(session.id).await.unwrap();
        assert!(Arc::ptr_eq(&session, &fetched));
        assert_eq!(store.len().await, 1);

        assert!(store.remove(session.id).await);
        assert!(!store.remove(session.id).await);
        assert!(store.get(session.id).await.is_none());
    }

    #[test]
    fn test_summary_reports_index_shape() {
        let session = Session::new(vec![], VectorIndex::default(), StyleDescriptor::default());
        let summary = session.summary();
        assert_eq!(summary.chunk_count, 0);
        assert_eq!(summary.embedding_dimension, 0);
        assert_eq!(summary.id, session.id);
    }
}
