//! # Session Registry
//!
//! In-process session table used by the cookie-session strategies.
//! Each registry is an owned value, so two strategies (or two tests) never
//! share sessions.
//!
//! ## Invariants
//! - Keyed by token digest, mapping token → user (never user → token)
//! - Sessions with a positive TTL expire at `created_at + ttl`
//! - Destroy invalidates immediately

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use super::crypto::{generate_token, hash_token};
use super::errors::{AuthError, AuthResult};
use super::user::UserId;

/// A live in-memory session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// User this session belongs to
    pub user_id: UserId,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => self.created_at + ttl < now,
            None => false,
        }
    }
}

/// Session registry configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Session lifetime; `None` keeps sessions until destroyed
    pub ttl: Option<Duration>,
}

impl SessionConfig {
    /// Build from a duration in seconds; zero or negative disables expiry
    pub fn from_secs(secs: i64) -> Self {
        let ttl = (secs > 0).then(|| Duration::seconds(secs));
        Self { ttl }
    }
}

/// Token → user table
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for a user and return the raw token
    pub fn create(&self, user_id: UserId) -> AuthResult<String> {
        self.create_at(user_id, Utc::now())
    }

    fn create_at(&self, user_id: UserId, created_at: DateTime<Utc>) -> AuthResult<String> {
        let mut sessions = self.sessions.write().map_err(|_| AuthError::lock_poisoned())?;
        sweep_expired(&mut sessions, self.config.ttl, Utc::now());

        // A digest collision would hand one user's session to another
        let (token, token_hash) = loop {
            let token = generate_token();
            let token_hash = hash_token(&token);
            if !sessions.contains_key(&token_hash) {
                break (token, token_hash);
            }
        };

        sessions.insert(token_hash, SessionEntry { user_id, created_at });
        Ok(token)
    }

    /// Resolve a raw token to its user, honoring expiry
    pub fn user_id_for(&self, token: &str) -> AuthResult<Option<UserId>> {
        if token.is_empty() {
            return Ok(None);
        }

        let sessions = self.sessions.read().map_err(|_| AuthError::lock_poisoned())?;
        let entry = match sessions.get(&hash_token(token)) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.is_expired(self.config.ttl, Utc::now()) {
            return Ok(None);
        }

        Ok(Some(entry.user_id))
    }

    /// Remove a session; returns whether one was removed
    pub fn destroy(&self, token: &str) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().map_err(|_| AuthError::lock_poisoned())?;
        Ok(sessions.remove(&hash_token(token)).is_some())
    }

    /// Delete expired sessions; creating a session does this too
    pub fn delete_expired(&self) -> AuthResult<usize> {
        let mut sessions = self.sessions.write().map_err(|_| AuthError::lock_poisoned())?;
        Ok(sweep_expired(&mut sessions, self.config.ttl, Utc::now()))
    }

    /// Number of tracked sessions, expired ones included
    pub fn len(&self) -> AuthResult<usize> {
        let sessions = self.sessions.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(sessions.len())
    }
}

fn sweep_expired(
    sessions: &mut HashMap<String, SessionEntry>,
    ttl: Option<Duration>,
    now: DateTime<Utc>,
) -> usize {
    if ttl.is_none() {
        return 0;
    }
    let before = sessions.len();
    sessions.retain(|_, entry| !entry.is_expired(ttl, now));
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let registry = SessionRegistry::default();

        let token = registry.create(UserId(1)).unwrap();

        assert!(!token.is_empty());
        assert_eq!(registry.user_id_for(&token).unwrap(), Some(UserId(1)));
    }

    #[test]
    fn test_registry_is_keyed_by_token() {
        let registry = SessionRegistry::default();

        let first = registry.create(UserId(1)).unwrap();
        let second = registry.create(UserId(1)).unwrap();

        // A user id is not a token
        assert_eq!(registry.user_id_for("1").unwrap(), None);
        assert_eq!(registry.user_id_for(&first).unwrap(), Some(UserId(1)));
        assert_eq!(registry.user_id_for(&second).unwrap(), Some(UserId(1)));
    }

    #[test]
    fn test_unknown_and_empty_tokens() {
        let registry = SessionRegistry::default();
        registry.create(UserId(1)).unwrap();

        assert_eq!(registry.user_id_for("").unwrap(), None);
        assert_eq!(registry.user_id_for("invalid_token").unwrap(), None);
    }

    #[test]
    fn test_session_destroy() {
        let registry = SessionRegistry::default();
        let token = registry.create(UserId(1)).unwrap();

        assert!(registry.destroy(&token).unwrap());
        assert!(!registry.destroy(&token).unwrap());
        assert_eq!(registry.user_id_for(&token).unwrap(), None);
    }

    #[test]
    fn test_session_expiry() {
        let registry = SessionRegistry::new(SessionConfig::from_secs(60));

        let fresh = registry.create(UserId(1)).unwrap();
        let stale = registry
            .create_at(UserId(2), Utc::now() - Duration::seconds(120))
            .unwrap();

        assert_eq!(registry.user_id_for(&fresh).unwrap(), Some(UserId(1)));
        assert_eq!(registry.user_id_for(&stale).unwrap(), None);

        assert_eq!(registry.delete_expired().unwrap(), 1);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_create_sweeps_expired_sessions() {
        let registry = SessionRegistry::new(SessionConfig::from_secs(60));
        let long_ago = Utc::now() - Duration::seconds(120);

        for id in 1..=5 {
            registry.create_at(UserId(id), long_ago).unwrap();
        }
        // Entries created already expired are swept by the next create
        assert_eq!(registry.len().unwrap(), 1);

        let fresh = registry.create(UserId(9)).unwrap();
        assert_eq!(registry.len().unwrap(), 1);
        assert_eq!(registry.user_id_for(&fresh).unwrap(), Some(UserId(9)));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let registry = SessionRegistry::new(SessionConfig::from_secs(0));
        let old = registry
            .create_at(UserId(1), Utc::now() - Duration::days(365))
            .unwrap();

        assert_eq!(registry.user_id_for(&old).unwrap(), Some(UserId(1)));
        assert_eq!(registry.delete_expired().unwrap(), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = SessionRegistry::default();
        let b = SessionRegistry::default();

        let token = a.create(UserId(1)).unwrap();
        assert_eq!(b.user_id_for(&token).unwrap(), None);
    }
}
