//! Router-side OIDC session state: the post-login `Session` table and the
//! `PendingAuth` entries that bridge an `/auth/login` redirect to its
//! `/auth/callback`. Both are swept for expiry on access rather than on a
//! background timer, mirroring the single-writer discipline used elsewhere
//! in this system for on-disk state.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// TTL for an established session.
pub const SESSION_TTL: Duration = Duration::hours(4);
/// TTL for a pending OAuth round trip; single-use.
pub const PENDING_AUTH_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user: String,
    pub tokens: TokenSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub state: String,
    pub nonce: String,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory session store. Every lookup first evicts expired entries,
/// so no background sweep task is needed.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    pending: RwLock<HashMap<String, PendingAuth>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_auth(&self, redirect_uri: String) -> PendingAuth {
        let pending = PendingAuth {
            state: Uuid::new_v4().to_string(),
            nonce: Uuid::new_v4().to_string(),
            redirect_uri,
            created_at: Utc::now(),
        };
        self.sweep_pending();
        self.pending.write().expect("pending lock poisoned").insert(pending.state.clone(), pending.clone());
        pending
    }

    /// Consume a pending entry by `state`. Single-use: a second call with
    /// the same state returns `None`.
    pub fn take_pending(&self, state: &str) -> Option<PendingAuth> {
        self.sweep_pending();
        self.pending.write().expect("pending lock poisoned").remove(state)
    }

    pub fn insert(&self, session: Session) {
        self.sweep_sessions();
        self.sessions.write().expect("session lock poisoned").insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sweep_sessions();
        self.sessions.read().expect("session lock poisoned").get(id).cloned()
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().expect("session lock poisoned").remove(id);
    }

    fn sweep_sessions(&self) {
        let now = Utc::now();
        self.sessions.write().expect("session lock poisoned").retain(|_, s| s.expires_at > now);
    }

    fn sweep_pending(&self) {
        let cutoff = Utc::now() - PENDING_AUTH_TTL;
        self.pending.write().expect("pending lock poisoned").retain(|_, p| p.created_at > cutoff);
    }
}

#[must_use]
pub fn new_session(user: String, access_token: String, refresh_token: Option<String>) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4().to_string(),
        user,
        tokens: TokenSet { access_token, refresh_token },
        created_at: now,
        updated_at: now,
        expires_at: now + SESSION_TTL,
        refresh_expires_at: now + SESSION_TTL * 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_auth_is_single_use() {
        let store = SessionStore::new();
        let pending = store.begin_auth("https://example.test/cb".to_string());
        assert!(store.take_pending(&pending.state).is_some());
        assert!(store.take_pending(&pending.state).is_none());
    }

    #[test]
    fn expired_session_is_swept_on_access() {
        let store = SessionStore::new();
        let mut session = new_session("alice".to_string(), "tok".to_string(), None);
        session.expires_at = Utc::now() - Duration::seconds(1);
        let id = session.id.clone();
        store.insert(session);
        assert!(store.get(&id).is_none());
    }
}
