//! Per-session state
//!
//! A [`Session`] is a cheap handle (session id + store) passed explicitly
//! through the dispatch pipeline. Values are type-erased so that handlers
//! can keep arbitrary data alongside the framework's own keys.

mod form;

pub use form::{FormSession, MethodRef};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub type SessionValue = Arc<dyn Any + Send + Sync>;

/// Keys the framework reads and writes.
pub mod keys {
    /// `bool`: whether the session is authenticated.
    pub const AUTHENTICATED: &str = "authenticated";
    /// `String`: the role of the authenticated user.
    pub const PROFILE: &str = "profile";
    pub const STORED_METHOD: &str = "stored_method";
    pub const STORED_CONTROLLER: &str = "stored_controller";
    /// `serde_json::Value`: field errors kept across a redirect.
    pub const VALIDATION_ERRORS: &str = "validationErrors";
}

/// Backing storage for sessions, keyed by session id.
pub trait SessionStore: Send + Sync + 'static {
    fn get(&self, session_id: &str, key: &str) -> Option<SessionValue>;

    fn insert(&self, session_id: &str, key: &str, value: SessionValue);

    fn remove(&self, session_id: &str, key: &str) -> Option<SessionValue>;

    /// Drops every value of the session.
    fn invalidate(&self, session_id: &str);

    fn contains(&self, session_id: &str, key: &str) -> bool {
        self.get(session_id, key).is_some()
    }

    /// Removes sessions that have gone idle. Returns how many were dropped.
    fn cleanup_expired(&self) -> usize {
        0
    }
}

/// Idle time after which an untouched session is discarded.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Minimum spacing between two sweeps triggered by new sessions.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    values: HashMap<String, SessionValue>,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn new(ttl: chrono::Duration) -> Self {
        Self {
            values: HashMap::new(),
            expires_at: deadline(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    fn touch(&mut self, ttl: chrono::Duration) {
        self.expires_at = deadline(ttl);
    }
}

fn deadline(ttl: chrono::Duration) -> DateTime<Utc> {
    Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// In-process session store with a sliding idle timeout.
///
/// Every read or write extends the session's lifetime. Expired sessions are
/// dropped when next looked up, and a sweep over the whole map runs when new
/// sessions are created, at most once per minute.
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_timeout: chrono::Duration,
    next_cleanup: Mutex<DateTime<Utc>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or(chrono::Duration::MAX),
            next_cleanup: Mutex::new(Utc::now()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn maybe_cleanup(&self) {
        let Ok(mut next) = self.next_cleanup.try_lock() else {
            return;
        };
        let now = Utc::now();
        if now < *next {
            return;
        }
        *next = deadline(chrono::Duration::from_std(CLEANUP_INTERVAL).unwrap_or_default());
        drop(next);

        let dropped = self.cleanup_expired();
        if dropped > 0 {
            debug!("Dropped {} idle session(s)", dropped);
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str, key: &str) -> Option<SessionValue> {
        let mut entry = self.sessions.get_mut(session_id)?;
        if entry.is_expired() {
            drop(entry);
            self.sessions
                .remove_if(session_id, |_, entry| entry.is_expired());
            return None;
        }
        entry.touch(self.idle_timeout);
        entry.values.get(key).cloned()
    }

    fn insert(&self, session_id: &str, key: &str, value: SessionValue) {
        let created = {
            let mut entry = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionEntry::new(self.idle_timeout));
            let created = entry.values.is_empty();
            if entry.is_expired() {
                entry.values.clear();
            }
            entry.touch(self.idle_timeout);
            entry.values.insert(key.to_string(), value);
            created
        };
        if created {
            self.maybe_cleanup();
        }
    }

    fn remove(&self, session_id: &str, key: &str) -> Option<SessionValue> {
        self.sessions
            .get_mut(session_id)
            .and_then(|mut entry| entry.values.remove(key))
    }

    fn invalidate(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    fn cleanup_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.sessions.len())
    }
}

/// Handle on one logical user session.
#[derive(Clone)]
pub struct Session {
    id: Arc<str>,
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(id: impl Into<Arc<str>>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    /// A session backed by its own private in-memory store.
    pub fn detached(id: impl Into<Arc<str>>) -> Self {
        Self::new(id, Arc::new(MemorySessionStore::new()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn insert<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.store.insert(&self.id, key, Arc::new(value));
    }

    pub fn insert_shared(&self, key: &str, value: SessionValue) {
        self.store.insert(&self.id, key, value);
    }

    /// Typed lookup; `None` when absent or stored with another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get_raw(key)?.downcast::<T>().ok()
    }

    pub fn get_raw(&self, key: &str) -> Option<SessionValue> {
        self.store.get(&self.id, key)
    }

    pub fn remove(&self, key: &str) -> Option<SessionValue> {
        self.store.remove(&self.id, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(&self.id, key)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get::<bool>(keys::AUTHENTICATED)
            .is_some_and(|authenticated| *authenticated)
    }

    pub fn role(&self) -> Option<Arc<String>> {
        self.get::<String>(keys::PROFILE)
    }

    /// Marks the session authenticated, optionally with a role.
    pub fn authenticate(&self, role: Option<&str>) {
        self.insert(keys::AUTHENTICATED, true);
        match role {
            Some(role) => self.insert(keys::PROFILE, role.to_string()),
            None => {
                self.remove(keys::PROFILE);
            }
        }
    }

    pub fn logout(&self) {
        self.remove(keys::AUTHENTICATED);
        self.remove(keys::PROFILE);
    }

    pub fn invalidate(&self) {
        self.store.invalidate(&self.id);
    }

    pub fn form(&self) -> FormSession<'_> {
        FormSession::new(self)
    }
}
