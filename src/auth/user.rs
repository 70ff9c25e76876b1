//! # User Management
//!
//! User model and the storage seam the authority talks to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::constant_time_str_eq;
use super::errors::{AuthError, AuthResult};

/// Numeric user identifier, assigned by the store on insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: UserId,

    /// User's email address (unique, case-sensitive)
    pub email: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub hashed_password: String,

    /// Digest of the live session token, if logged in
    #[serde(skip_serializing)]
    pub session_token_hash: Option<String>,

    /// Digest of the pending reset token, if one was issued
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,

    /// When the user was created
    pub created_at: DateTime<Utc>,

    /// When the user was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user currently holds a session token
    pub fn has_session(&self) -> bool {
        self.session_token_hash.is_some()
    }

    /// Whether a reset token is outstanding
    pub fn has_pending_reset(&self) -> bool {
        self.reset_token_hash.is_some()
    }
}

/// Fields required to insert a user; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
}

/// Partial update applied to a user record in one write
///
/// `None` leaves a field untouched. For the token fields, `Some(None)`
/// clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub hashed_password: Option<String>,
    pub session_token_hash: Option<Option<String>>,
    pub reset_token_hash: Option<Option<String>>,
}

impl UserChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hashed_password(mut self, hash: String) -> Self {
        self.hashed_password = Some(hash);
        self
    }

    pub fn session_token_hash(mut self, hash: Option<String>) -> Self {
        self.session_token_hash = Some(hash);
        self
    }

    pub fn reset_token_hash(mut self, hash: Option<String>) -> Self {
        self.reset_token_hash = Some(hash);
        self
    }

    /// True if applying these changes would not touch any field
    pub fn is_empty(&self) -> bool {
        self.hashed_password.is_none()
            && self.session_token_hash.is_none()
            && self.reset_token_hash.is_none()
    }

    /// Apply to a record in place
    pub fn apply_to(self, user: &mut User) {
        if let Some(hash) = self.hashed_password {
            user.hashed_password = hash;
        }
        if let Some(session) = self.session_token_hash {
            user.session_token_hash = session;
        }
        if let Some(reset) = self.reset_token_hash {
            user.reset_token_hash = reset;
        }
        user.updated_at = Utc::now();
    }
}

/// User store trait
///
/// Abstracts storage operations for users. Each `update` call must be
/// applied atomically: either every field in the `UserChanges` lands or none
/// does.
pub trait UserStore: Send + Sync {
    /// Find a user by their ID
    fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>>;

    /// Find a user by their email (exact match)
    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Find the user holding a session token digest
    fn find_by_session_token(&self, token_hash: &str) -> AuthResult<Option<User>>;

    /// Find the user holding a reset token digest
    fn find_by_reset_token(&self, token_hash: &str) -> AuthResult<Option<User>>;

    /// Insert a new user, returning the stored record
    fn insert(&self, user: NewUser) -> AuthResult<User>;

    /// Apply changes to an existing user; `NotFound` if the id is unknown
    fn update(&self, id: UserId, changes: UserChanges) -> AuthResult<()>;
}

/// In-memory user store
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: std::sync::RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn len(&self) -> AuthResult<usize> {
        let users = self.users.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(users.len())
    }

    pub fn is_empty(&self) -> AuthResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    fn find_by_session_token(&self, token_hash: &str) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(users
            .iter()
            .find(|u| {
                u.session_token_hash
                    .as_deref()
                    .is_some_and(|h| constant_time_str_eq(h, token_hash))
            })
            .cloned())
    }

    fn find_by_reset_token(&self, token_hash: &str) -> AuthResult<Option<User>> {
        let users = self.users.read().map_err(|_| AuthError::lock_poisoned())?;
        Ok(users
            .iter()
            .find(|u| {
                u.reset_token_hash
                    .as_deref()
                    .is_some_and(|h| constant_time_str_eq(h, token_hash))
            })
            .cloned())
    }

    fn insert(&self, user: NewUser) -> AuthResult<User> {
        let mut users = self.users.write().map_err(|_| AuthError::lock_poisoned())?;

        if users.iter().any(|u| u.email == user.email) {
            return Err(AuthError::AlreadyExists);
        }

        // Users are never deleted, so ids stay dense
        let now = Utc::now();
        let stored = User {
            id: UserId(users.len() as u64 + 1),
            email: user.email,
            hashed_password: user.hashed_password,
            session_token_hash: None,
            reset_token_hash: None,
            created_at: now,
            updated_at: now,
        };

        users.push(stored.clone());
        Ok(stored)
    }

    fn update(&self, id: UserId, changes: UserChanges) -> AuthResult<()> {
        let mut users = self.users.write().map_err(|_| AuthError::lock_poisoned())?;

        let existing = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AuthError::NotFound)?;
        if !changes.is_empty() {
            changes.apply_to(existing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            hashed_password: "$argon2id$placeholder".to_string(),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let store = InMemoryUserStore::new();

        let first = store.insert(new_user("a@x.com")).unwrap();
        let second = store.insert(new_user("b@x.com")).unwrap();

        assert_eq!(first.id, UserId(1));
        assert_eq!(second.id, UserId(2));
        assert!(!first.has_session());
        assert!(!first.has_pending_reset());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("a@x.com")).unwrap();

        assert!(matches!(
            store.insert(new_user("a@x.com")),
            Err(AuthError::AlreadyExists)
        ));
    }

    #[test]
    fn test_email_lookup_is_case_sensitive() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("a@x.com")).unwrap();

        assert!(store.find_by_email("a@x.com").unwrap().is_some());
        assert!(store.find_by_email("A@X.COM").unwrap().is_none());
    }

    #[test]
    fn test_update_sets_and_clears_tokens() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@x.com")).unwrap();

        store
            .update(
                user.id,
                UserChanges::new()
                    .session_token_hash(Some("s-hash".into()))
                    .reset_token_hash(Some("r-hash".into())),
            )
            .unwrap();

        let by_session = store.find_by_session_token("s-hash").unwrap().unwrap();
        assert_eq!(by_session.id, user.id);
        let by_reset = store.find_by_reset_token("r-hash").unwrap().unwrap();
        assert_eq!(by_reset.id, user.id);

        store
            .update(user.id, UserChanges::new().session_token_hash(None))
            .unwrap();

        assert!(store.find_by_session_token("s-hash").unwrap().is_none());
        // Untouched field survives
        assert!(store.find_by_reset_token("r-hash").unwrap().is_some());
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = InMemoryUserStore::new();
        let result = store.update(UserId(42), UserChanges::new().session_token_hash(None));
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[test]
    fn test_user_serialization_omits_secrets() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@x.com")).unwrap();
        store
            .update(user.id, UserChanges::new().session_token_hash(Some("s-hash".into())))
            .unwrap();
        let user = store.find_by_id(user.id).unwrap().unwrap();

        let json = serde_json::to_string(&user).unwrap();

        assert!(!json.contains("hashed_password"));
        assert!(!json.contains(&user.hashed_password));
        assert!(!json.contains("s-hash"));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_empty_changes_leave_record_untouched() {
        assert!(UserChanges::new().is_empty());
        assert!(!UserChanges::new().session_token_hash(None).is_empty());

        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("a@x.com")).unwrap();

        store.update(user.id, UserChanges::new()).unwrap();
        assert_eq!(store.find_by_id(user.id).unwrap().unwrap(), user);

        let result = store.update(UserId(42), UserChanges::new());
        assert!(matches!(result, Err(AuthError::NotFound)));
    }
}
