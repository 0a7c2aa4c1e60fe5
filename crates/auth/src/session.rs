//! Admin session store.
//!
//! A session is keyed by `sha256(user_id ‖ fingerprint ‖ token_ref)`, so a
//! stolen token presented from a different client resolves to no session.
//! PIN-elevated operations verify against the session-bound PIN hash; a
//! verified PIN never changes the token, it annotates the request only.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use arcp_domain::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub user_id: String,
    pub pin_hash: Option<[u8; 32]>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
    pin_min_len: usize,
}

impl SessionStore {
    pub fn new(timeout_minutes: u64, pin_min_len: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::minutes(timeout_minutes.max(1) as i64),
            pin_min_len,
        }
    }

    /// Derive the session key from its three binding ingredients.
    pub fn session_key(user_id: &str, fingerprint: &str, token_ref: &str) -> String {
        let digest = Sha256::digest(format!("{user_id}{fingerprint}{token_ref}").as_bytes());
        hex::encode(digest)
    }

    /// Create (or replace) the session for this binding; returns the key.
    pub fn create(&self, user_id: &str, fingerprint: &str, token_ref: &str) -> String {
        let key = Self::session_key(user_id, fingerprint, token_ref);
        let now = Utc::now();
        self.sessions.write().insert(
            key.clone(),
            SessionEntry {
                user_id: user_id.to_string(),
                pin_hash: None,
                created_at: now,
                last_activity: now,
            },
        );
        tracing::debug!(user_id, "admin session created");
        key
    }

    /// Resolve a live session, refreshing its activity timestamp. Expired
    /// sessions are removed on touch.
    pub fn touch(&self, key: &str) -> Option<SessionEntry> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        match sessions.get_mut(key) {
            Some(entry) if now - entry.last_activity <= self.ttl => {
                entry.last_activity = now;
                Some(entry.clone())
            }
            Some(_) => {
                sessions.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.sessions.write().remove(key).is_some()
    }

    /// Bind a PIN hash to a live session.
    pub fn set_pin(&self, key: &str, pin: &str) -> Result<()> {
        if pin.len() < self.pin_min_len || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(format!(
                "PIN must be at least {} digits",
                self.pin_min_len
            )));
        }
        if self.touch(key).is_none() {
            return Err(Error::AuthenticationFailed("no active session".into()));
        }
        let digest: [u8; 32] = Sha256::digest(pin.as_bytes()).into();
        if let Some(entry) = self.sessions.write().get_mut(key) {
            entry.pin_hash = Some(digest);
        }
        Ok(())
    }

    /// Constant-time PIN verification against the session-bound hash.
    ///
    /// `PinRequired` when the session has no PIN yet; `Ok(false)` on
    /// mismatch so the caller can count it against the `pin` bucket.
    pub fn verify_pin(&self, key: &str, pin: &str) -> Result<bool> {
        let entry = self
            .touch(key)
            .ok_or_else(|| Error::AuthenticationFailed("no active session".into()))?;
        let expected = entry
            .pin_hash
            .ok_or_else(|| Error::PinRequired("no PIN set for this session".into()))?;
        let provided: [u8; 32] = Sha256::digest(pin.as_bytes()).into();
        Ok(provided.ct_eq(&expected).into())
    }

    /// Drop sessions idle past the TTL; returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_activity <= self.ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned expired admin sessions");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(30, 4)
    }

    #[test]
    fn session_key_binds_all_ingredients() {
        let base = SessionStore::session_key("admin", "fp-1", "ref-1");
        assert_ne!(base, SessionStore::session_key("admin", "fp-2", "ref-1"));
        assert_ne!(base, SessionStore::session_key("admin", "fp-1", "ref-2"));
        assert_ne!(base, SessionStore::session_key("other", "fp-1", "ref-1"));
        assert_eq!(base, SessionStore::session_key("admin", "fp-1", "ref-1"));
    }

    #[test]
    fn create_touch_remove() {
        let store = store();
        let key = store.create("admin", "fp", "ref");
        assert!(store.touch(&key).is_some());
        assert!(store.remove(&key));
        assert!(store.touch(&key).is_none());
    }

    #[test]
    fn pin_lifecycle() {
        let store = store();
        let key = store.create("admin", "fp", "ref");

        // No PIN yet → PinRequired.
        assert!(matches!(
            store.verify_pin(&key, "1234"),
            Err(Error::PinRequired(_))
        ));

        store.set_pin(&key, "4321").unwrap();
        assert!(store.verify_pin(&key, "4321").unwrap());
        assert!(!store.verify_pin(&key, "1234").unwrap());
    }

    #[test]
    fn weak_pins_rejected() {
        let store = store();
        let key = store.create("admin", "fp", "ref");
        assert!(store.set_pin(&key, "12").is_err());
        assert!(store.set_pin(&key, "abcd").is_err());
        assert!(store.set_pin(&key, "0042").is_ok());
    }

    #[test]
    fn unknown_session_is_authentication_failure() {
        let store = store();
        assert!(matches!(
            store.verify_pin("missing", "1234"),
            Err(Error::AuthenticationFailed(_))
        ));
        assert!(matches!(
            store.set_pin("missing", "1234"),
            Err(Error::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn expired_sessions_are_pruned() {
        let store = SessionStore::new(1, 4);
        let key = store.create("admin", "fp", "ref");
        // Backdate the session past the TTL.
        store.sessions.write().get_mut(&key).unwrap().last_activity =
            Utc::now() - Duration::minutes(5);
        assert_eq!(store.prune_expired(), 1);
        assert!(store.is_empty());
    }
}
