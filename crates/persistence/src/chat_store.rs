//! In-memory chat session store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use weeklog_core::{ChatSession, ChatStore, Exchange, Result};

use crate::PersistenceError;

/// In-memory chat store keyed by (user_id, chat_id). Chat ids are
/// client-supplied, so the user id is part of the key: the same chat id
/// under two users addresses two independent sessions.
#[derive(Default)]
pub struct InMemoryChatStore {
    sessions: DashMap<(String, String), ChatSession>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_id: &str, chat_id: &str) -> (String, String) {
        (user_id.to_string(), chat_id.to_string())
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn get(&self, user_id: &str, chat_id: &str) -> Result<Option<ChatSession>> {
        Ok(self
            .sessions
            .get(&Self::key(user_id, chat_id))
            .map(|s| s.clone()))
    }

    async fn create(&self, user_id: &str, chat_id: &str) -> Result<ChatSession> {
        let session = ChatSession::new(user_id, chat_id);
        self.sessions
            .insert(Self::key(user_id, chat_id), session.clone());
        tracing::debug!(user_id, chat_id, "created chat session");
        Ok(session)
    }

    async fn get_or_create(&self, user_id: &str, chat_id: &str) -> Result<ChatSession> {
        if let Some(existing) = self.get(user_id, chat_id).await? {
            return Ok(existing);
        }
        self.create(user_id, chat_id).await
    }

    async fn append(
        &self,
        user_id: &str,
        chat_id: &str,
        exchanges: Vec<Exchange>,
    ) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(&Self::key(user_id, chat_id))
            .ok_or_else(|| {
                PersistenceError::NotFound(format!("chat {} for user {}", chat_id, user_id))
            })?;

        session.exchanges.extend(exchanges);
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.clone())
            .collect();

        // Most recently updated first
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemoryChatStore::new();

        let first = store.get_or_create("u1", "c1").await.unwrap();
        assert!(first.exchanges.is_empty());

        store
            .append("u1", "c1", vec![Exchange::new("q", "a")])
            .await
            .unwrap();

        let second = store.get_or_create("u1", "c1").await.unwrap();
        assert_eq!(second.exchanges.len(), 1);
    }

    #[tokio::test]
    async fn test_get_scopes_by_user() {
        let store = InMemoryChatStore::new();
        store.create("u1", "c1").await.unwrap();

        assert!(store.get("u1", "c1").await.unwrap().is_some());
        assert!(store.get("u2", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_chat_id_is_isolated_per_user() {
        let store = InMemoryChatStore::new();
        store.create("alice", "c1").await.unwrap();
        store
            .append("alice", "c1", vec![Exchange::new("q", "a")])
            .await
            .unwrap();

        // Another user reusing the chat id gets a fresh session and
        // leaves the original untouched.
        let bobs = store.get_or_create("bob", "c1").await.unwrap();
        assert!(bobs.exchanges.is_empty());

        let alices = store.get("alice", "c1").await.unwrap().unwrap();
        assert_eq!(alices.exchanges.len(), 1);

        store
            .append("bob", "c1", vec![Exchange::new("q2", "a2")])
            .await
            .unwrap();
        let alices = store.get("alice", "c1").await.unwrap().unwrap();
        assert_eq!(alices.exchanges.len(), 1);
        assert_eq!(alices.exchanges[0].user_input, "q");
    }

    #[tokio::test]
    async fn test_append_to_missing_chat_errors() {
        let store = InMemoryChatStore::new();
        let err = store
            .append("u1", "nope", vec![Exchange::new("q", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, weeklog_core::Error::Store(_)));
    }

    #[tokio::test]
    async fn test_list_by_user_orders_by_recency() {
        let store = InMemoryChatStore::new();
        store.create("u1", "older").await.unwrap();
        store.create("u1", "newer").await.unwrap();
        store.create("u2", "other").await.unwrap();

        store
            .append("u1", "newer", vec![Exchange::new("q", "a")])
            .await
            .unwrap();

        let sessions = store.list_by_user("u1").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].chat_id, "newer");
    }
}
