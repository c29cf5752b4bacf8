//! In-memory session registry.
//!
//! The only shared mutable structure in the bridge. `remove` hands a session
//! out at most once, so whoever removes it is the one entitled to terminate
//! it; a process is never killed twice.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::session::Session;
use crate::{AppError, Result};

/// Session table keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionExists` if the id is already registered.
    pub async fn put(&self, session: Arc<Session>) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(session.id()) {
            return Err(AppError::SessionExists(session.id().to_owned()));
        }
        debug!(session_id = session.id(), "session registered");
        sessions.insert(session.id().to_owned(), session);
        Ok(())
    }

    /// Look up a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionNotFound` if the id is unknown.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_owned()))
    }

    /// Remove a session, returning it if this call removed it.
    ///
    /// Removing an absent id is a no-op.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.lock().await.remove(id);
        if removed.is_some() {
            debug!(session_id = id, "session removed");
        }
        removed
    }

    /// Point-in-time copy of every registered session.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().await.values().cloned().collect()
    }

    /// Visit every session registered at the time of the call.
    ///
    /// The lock is released before `f` runs, so `f` may insert or remove.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Session>),
    {
        for session in self.snapshot().await {
            f(&session);
        }
    }

    /// Remove and return every session.
    pub async fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.lock().await.contains_key(id)
    }
}
