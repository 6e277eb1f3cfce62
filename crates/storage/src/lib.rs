use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;
use travelguide_core::Session;

/// Per-user dialog sessions.
///
/// Sessions are created lazily on first contact and live until they are
/// reset or the process exits.
pub trait SessionRepository: Send + Sync {
    async fn get_or_create(&self, user_id: &str) -> Result<Session>;

    /// Runs `apply` against the stored session under the store's write lock.
    async fn update<F, R>(&self, user_id: &str, apply: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R + Send,
        R: Send;

    async fn reset(&self, user_id: &str) -> Result<Session>;
    async fn session_count(&self) -> Result<usize>;
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_user_id(user_id: &str) -> Result<()> {
    ensure!(!user_id.trim().is_empty(), "user id must not be empty");
    Ok(())
}

impl SessionRepository for MemorySessionStore {
    async fn get_or_create(&self, user_id: &str) -> Result<Session> {
        check_user_id(user_id)?;
        if let Some(session) = self.sessions.read().get(user_id) {
            return Ok(session.clone());
        }

        let session = self
            .sessions
            .write()
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id))
            .clone();
        Ok(session)
    }

    async fn update<F, R>(&self, user_id: &str, apply: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R + Send,
        R: Send,
    {
        check_user_id(user_id)?;
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id));
        let result = apply(session);
        session.updated_at = Utc::now();
        Ok(result)
    }

    async fn reset(&self, user_id: &str) -> Result<Session> {
        check_user_id(user_id)?;
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id));
        session.clear();
        Ok(session.clone())
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self.sessions.read().len())
    }
}

type LockMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Serializes turns of the same user while different users proceed in parallel.
///
/// An entry lives only while some turn holds or waits for it.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: LockMap,
}

/// Held for the duration of one turn.
pub struct UserTurn {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: LockMap,
}

impl Drop for UserTurn {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        let idle = locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.user_id);
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> UserTurn {
        let lock = self
            .locks
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .clone();
        UserTurn {
            guard: Some(lock.lock_owned().await),
            user_id: user_id.to_string(),
            locks: self.locks.clone(),
        }
    }

    pub fn tracked_users(&self) -> usize {
        self.locks.lock().len()
    }
}
