//! Session tracking, orthogonal to token cryptographic validity.
//!
//! A signed token has no built-in recall mechanism; the session record is
//! the indirection that makes immediate revocation possible. A request is
//! honored only while its session is active, unexpired, and carries the
//! fingerprint of the presented token.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use bookforge_core::{SessionId, UserId};

/// One login event. Expired sessions are kept (inactive), never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    /// SHA-256 hex of the issued token; the raw token is never stored.
    pub token_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
}

/// Fingerprint a token for storage/comparison.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// In-memory session store.
///
/// Creation and revocation are atomic with respect to concurrent `is_active`
/// reads of the same session (single map-level lock, short critical
/// sections). Revocation is monotonic: once revoked, a session is never
/// re-activated, so last-writer-wins is safe.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a login. Multiple concurrent sessions per user are allowed;
    /// each is independently revocable.
    ///
    /// The caller supplies the id: it is minted before token issuance so the
    /// token can embed it, and the session can store the token's fingerprint.
    pub fn create(
        &self,
        id: SessionId,
        user_id: UserId,
        token_fingerprint: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            id,
            user_id,
            token_fingerprint,
            created_at: now,
            expires_at: now + ttl,
            active: true,
        };

        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session.id, session.clone());
        }

        session
    }

    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.sessions.read().ok()?.get(&session_id).cloned()
    }

    /// Whether the session should still be honored at `now`.
    pub fn is_active(&self, session_id: SessionId, now: DateTime<Utc>) -> bool {
        self.get(session_id)
            .map(|s| s.active && now < s.expires_at)
            .unwrap_or(false)
    }

    /// Whether the stored fingerprint matches the presented token's.
    pub fn fingerprint_matches(&self, session_id: SessionId, fingerprint: &str) -> bool {
        self.get(session_id)
            .map(|s| s.token_fingerprint == fingerprint)
            .unwrap_or(false)
    }

    /// Revoke one session (logout, forced logout). Idempotent: revoking a
    /// revoked session is a no-op, not an error.
    pub fn revoke(&self, session_id: SessionId) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::NotFound)?;
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
        session.active = false;
        Ok(())
    }

    /// Revoke every session belonging to a user (password change,
    /// administrator action). Returns how many sessions were deactivated.
    pub fn revoke_all(&self, user_id: UserId) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };

        let mut revoked = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.active {
                session.active = false;
                revoked += 1;
            }
        }
        revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_session() -> (SessionStore, Session) {
        let store = SessionStore::new();
        let session = store.create(
            SessionId::new(),
            UserId::new(),
            token_fingerprint("some.jwt.token"),
            Duration::hours(72),
            Utc::now(),
        );
        (store, session)
    }

    #[test]
    fn fresh_session_is_active_with_matching_fingerprint() {
        let (store, session) = store_with_session();
        assert!(store.is_active(session.id, Utc::now()));
        assert!(store.fingerprint_matches(session.id, &token_fingerprint("some.jwt.token")));
        assert!(!store.fingerprint_matches(session.id, &token_fingerprint("other.token")));
    }

    #[test]
    fn revoked_session_is_inactive_and_stays_revoked() {
        let (store, session) = store_with_session();
        store.revoke(session.id).unwrap();
        assert!(!store.is_active(session.id, Utc::now()));

        // Monotonic: revoking again is a no-op, the record survives.
        store.revoke(session.id).unwrap();
        assert!(store.get(session.id).is_some());
    }

    #[test]
    fn expired_session_is_inactive_but_retained() {
        let (store, session) = store_with_session();
        let after_expiry = session.expires_at + Duration::seconds(1);
        assert!(!store.is_active(session.id, after_expiry));
        assert!(store.get(session.id).is_some());
    }

    #[test]
    fn revoke_all_hits_only_that_users_sessions() {
        let store = SessionStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let a1 = store.create(SessionId::new(), alice, "fp-a1".to_string(), Duration::hours(1), Utc::now());
        let a2 = store.create(SessionId::new(), alice, "fp-a2".to_string(), Duration::hours(1), Utc::now());
        let b1 = store.create(SessionId::new(), bob, "fp-b1".to_string(), Duration::hours(1), Utc::now());

        assert_eq!(store.revoke_all(alice), 2);
        assert!(!store.is_active(a1.id, Utc::now()));
        assert!(!store.is_active(a2.id, Utc::now()));
        assert!(store.is_active(b1.id, Utc::now()));
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        assert_eq!(store.revoke(SessionId::new()), Err(SessionError::NotFound));
        assert!(!store.is_active(SessionId::new(), Utc::now()));
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(token_fingerprint("abc"), token_fingerprint("abc"));
        assert_ne!(token_fingerprint("abc"), token_fingerprint("abd"));
        assert_eq!(token_fingerprint("abc").len(), 64);
    }
}
