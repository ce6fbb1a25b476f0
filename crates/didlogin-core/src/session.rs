//! Session records and the session store API.
use crate::DEFAULT_SESSION_IDLE_SECS;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Number of compare-and-swap attempts before a session update is abandoned.
const MAX_SWAP_ATTEMPTS: usize = 16;

/// An error relating to session storage.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Session id was empty.
    #[error("Session id must not be empty.")]
    EmptySessionId,
    /// Underlying store could not be reached.
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),
    /// Concurrent writers kept replacing the session.
    #[error("Session {0} changed concurrently {1} times, update abandoned.")]
    ContentionExceeded(String, usize),
}

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// A web session, keyed by its opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// DID of the holder that logged in, set once by the authentication listener.
    pub did: Option<String>,
    /// Number of counted page views.
    pub views: u64,
    /// Expiry of the most recent login request issued for this session.
    pub login_request_expires: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            did: None,
            views: 0,
            login_request_expires: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.did.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Returns true if a login request was issued and its validity window has passed.
    pub fn login_request_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.login_request_expires, Some(expires) if now > expires)
    }
}

/// Storage interface for sessions. Every operation is atomic per session id.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync {
    /// Gets a session from the store.
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Stores a session, replacing any session with the same id.
    async fn set(&self, session: Session) -> Result<(), SessionError>;

    /// Removes a session from the store. Removing a missing session is not an error.
    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Replaces the stored session with `new` only if the stored value still equals `current`.
    /// Returns whether the swap took place.
    async fn compare_and_swap(&self, current: &Session, new: Session)
        -> Result<bool, SessionError>;

    /// Removes sessions left unused past the store's idle timeout, returning how many went.
    async fn purge_idle(&self) -> Result<usize, SessionError> {
        Ok(0)
    }
}

/// Outcome of a read-modify-write on a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// No session exists for the id.
    Missing,
    /// The modification declined to change the session.
    Unchanged(Session),
    /// The modified session was stored.
    Updated(Session),
}

/// Applies `modify` to the stored session atomically, retrying while other writers interleave.
///
/// `modify` returns `None` to leave the session as it is. It may run more than once.
pub async fn update_session<F>(
    store: &dyn SessionStore,
    id: &str,
    modify: F,
) -> Result<Update, SessionError>
where
    F: Fn(&Session) -> Option<Session> + Send + Sync,
{
    if id.is_empty() {
        return Err(SessionError::EmptySessionId);
    }
    for _ in 0..MAX_SWAP_ATTEMPTS {
        let Some(current) = store.get(id).await? else {
            return Ok(Update::Missing);
        };
        let Some(new) = modify(&current) else {
            return Ok(Update::Unchanged(current));
        };
        if store.compare_and_swap(&current, new.clone()).await? {
            return Ok(Update::Updated(new));
        }
        debug!("Session {} changed during update, retrying.", id);
    }
    Err(SessionError::ContentionExceeded(
        id.to_owned(),
        MAX_SWAP_ATTEMPTS,
    ))
}

/// Increments the view counter of a session by one.
pub async fn increment_views(store: &dyn SessionStore, id: &str) -> Result<Update, SessionError> {
    update_session(store, id, |session| {
        Some(Session {
            views: session.views + 1,
            ..session.clone()
        })
    })
    .await
}

#[derive(Debug, Clone)]
struct Entry {
    session: Session,
    last_seen: DateTime<Utc>,
}

impl Entry {
    fn new(session: Session) -> Self {
        Self {
            session,
            last_seen: Utc::now(),
        }
    }
}

/// A local in-memory session store.
///
/// Sessions not read or written for the idle timeout are evicted, lazily on access and
/// in bulk by [`SessionStore::purge_idle`].
///
/// # Warning
/// Sessions are not shared between replicas.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    store: Arc<RwLock<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_idle_timeout(Duration::seconds(DEFAULT_SESSION_IDLE_SECS))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    fn is_idle(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.last_seen) > self.idle_timeout
    }

    /// Live entry for `id`, evicting it first if it went idle.
    fn live_entry<'a>(
        &self,
        store: &'a mut HashMap<String, Entry>,
        id: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Entry> {
        if store.get(id).map_or(false, |entry| self.is_idle(entry, now)) {
            debug!("Session {} idle, evicted.", id);
            store.remove(id);
        }
        store.get_mut(id)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        Ok(self.live_entry(&mut store, id, now).map(|entry| {
            entry.last_seen = now;
            entry.session.clone()
        }))
    }

    async fn set(&self, session: Session) -> Result<(), SessionError> {
        if session.id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }
        self.store
            .write()
            .await
            .insert(session.id.clone(), Entry::new(session));
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.store.write().await.remove(id);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        current: &Session,
        new: Session,
    ) -> Result<bool, SessionError> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        match self.live_entry(&mut store, &current.id, now) {
            Some(entry) if &entry.session == current => {
                *entry = Entry {
                    session: new,
                    last_seen: now,
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_idle(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, entry| !self.is_idle(entry, now));
        Ok(before - store.len())
    }
}

/// Periodically purges idle sessions from a store.
pub struct IdleSweeper {
    store: Arc<dyn SessionStore>,
    every: std::time::Duration,
}

impl IdleSweeper {
    pub fn new(store: Arc<dyn SessionStore>, every: std::time::Duration) -> Self {
        Self { store, every }
    }

    pub fn spawn(self) -> SweeperHandle {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.every);
            loop {
                interval.tick().await;
                match self.store.purge_idle().await {
                    Ok(0) => {}
                    Ok(purged) => debug!("Purged {} idle sessions.", purged),
                    Err(err) => warn!("Failed to purge idle sessions: {}", err),
                }
            }
        });
        SweeperHandle { handle }
    }
}

/// Owns the sweeper task; the task is aborted when the handle is dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_set_destroy() {
        let store = MemoryStore::new();
        assert_eq!(store.get("abc").await.unwrap(), None);

        store.set(Session::new("abc")).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), Some(Session::new("abc")));
        assert_eq!(store.len().await, 1);

        store.destroy("abc").await.unwrap();
        assert!(store.is_empty().await);
        // Destroying twice is fine.
        store.destroy("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_rejects_empty_id() {
        let store = MemoryStore::new();
        assert_eq!(
            store.set(Session::new("")).await,
            Err(SessionError::EmptySessionId)
        );
    }

    #[tokio::test]
    async fn test_compare_and_swap_stale() {
        let store = MemoryStore::new();
        let original = Session::new("abc");
        store.set(original.clone()).await.unwrap();

        let first = Session {
            views: 1,
            ..original.clone()
        };
        assert!(store
            .compare_and_swap(&original, first.clone())
            .await
            .unwrap());

        // Swapping against the stale value must fail and leave the store untouched.
        let second = Session {
            did: Some("did:example:abc".to_string()),
            ..original.clone()
        };
        assert!(!store.compare_and_swap(&original, second).await.unwrap());
        assert_eq!(store.get("abc").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_compare_and_swap_destroyed() {
        let store = MemoryStore::new();
        let original = Session::new("abc");
        store.set(original.clone()).await.unwrap();
        store.destroy("abc").await.unwrap();
        assert!(!store
            .compare_and_swap(&original, original.clone())
            .await
            .unwrap());
        assert_eq!(store.get("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let store = MemoryStore::new();
        store.set(Session::new("abc")).await.unwrap();

        let first = increment_views(&store, "abc").await.unwrap();
        assert!(matches!(first, Update::Updated(ref s) if s.views == 1));
        let second = increment_views(&store, "abc").await.unwrap();
        assert!(matches!(second, Update::Updated(ref s) if s.views == 2));

        assert_eq!(increment_views(&store, "xyz").await.unwrap(), Update::Missing);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.set(Session::new("abc")).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { increment_views(store.as_ref(), "abc").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.get("abc").await.unwrap().unwrap().views, 8);
    }

    #[tokio::test]
    async fn test_update_unchanged() {
        let store = MemoryStore::new();
        store.set(Session::new("abc")).await.unwrap();
        let result = update_session(&store, "abc", |_| None).await.unwrap();
        assert_eq!(result, Update::Unchanged(Session::new("abc")));
        assert_eq!(
            update_session(&store, "", |_| None).await,
            Err(SessionError::EmptySessionId)
        );
    }

    #[tokio::test]
    async fn test_idle_sessions_evicted() {
        let store = MemoryStore::with_idle_timeout(Duration::milliseconds(50));
        store.set(Session::new("abc")).await.unwrap();
        store.set(Session::new("xyz")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        // Lazy eviction on access.
        assert_eq!(store.get("abc").await.unwrap(), None);
        assert!(!store
            .compare_and_swap(&Session::new("abc"), Session::new("abc"))
            .await
            .unwrap());
        assert_eq!(store.len().await, 1);

        // Bulk eviction of the rest.
        assert_eq!(store.purge_idle().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_access_keeps_session_alive() {
        let store = MemoryStore::with_idle_timeout(Duration::milliseconds(200));
        store.set(Session::new("abc")).await.unwrap();
        for _ in 0..4 {
            tokio::time::sleep(std::time::Duration::from_millis(80)).await;
            assert!(store.get("abc").await.unwrap().is_some());
        }
        assert_eq!(store.purge_idle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_purges_idle_sessions() {
        let store = Arc::new(MemoryStore::with_idle_timeout(Duration::milliseconds(20)));
        store.set(Session::new("abc")).await.unwrap();
        let _sweeper =
            IdleSweeper::new(store.clone(), std::time::Duration::from_millis(10)).spawn();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_login_request_expired() {
        let now = Utc::now();
        let mut session = Session::new("abc");
        assert!(!session.login_request_expired(now));
        session.login_request_expires = Some(now + Duration::seconds(10));
        assert!(!session.login_request_expired(now));
        session.login_request_expires = Some(now - Duration::seconds(10));
        assert!(session.login_request_expired(now));
    }

    #[test]
    fn test_state() {
        let mut session = Session::new("abc");
        assert_eq!(session.state(), SessionState::Unauthenticated);
        session.did = Some("did:example:abc".to_string());
        assert_eq!(session.state(), SessionState::Authenticated);
    }
}
