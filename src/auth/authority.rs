//! # Session Authority
//!
//! Owns the mapping between users and their opaque session / reset tokens.
//! All state lives in the [`UserStore`]; the authority itself only holds
//! collaborators and policy.
//!
//! ## Invariants
//! - At most one live session token and one live reset token per user
//! - A non-null token value identifies exactly one user
//! - A reset token is cleared whenever it is presented to a user that holds it,
//!   whether or not the password update succeeds
//! - Credential checks answer `false` identically for unknown email and wrong
//!   password

use std::sync::{Arc, OnceLock};

use super::crypto::{generate_token, hash_token, PasswordHasher, PasswordPolicy};
use super::errors::{AuthError, AuthResult};
use super::user::{NewUser, User, UserChanges, UserId, UserStore};
use crate::observability::{log_event_with_fields, Event, Logger};

/// Attempts at drawing a token that no other user already holds
const MAX_TOKEN_ATTEMPTS: usize = 3;

/// Plaintext behind the dummy hash used to equalize credential-check timing
const TIMING_DUMMY_PASSWORD: &str = "timing-equalization-dummy";

/// Which token column a lookup or update targets
#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Session,
    Reset,
}

/// Issues, resolves, and revokes session and reset tokens
pub struct SessionAuthority {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    password_policy: PasswordPolicy,
    dummy_hash: OnceLock<Option<String>>,
}

impl SessionAuthority {
    pub fn new(store: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::with_policy(store, hasher, PasswordPolicy::default())
    }

    pub fn with_policy(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        password_policy: PasswordPolicy,
    ) -> Self {
        Self {
            store,
            hasher,
            password_policy,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    /// Register a new user
    ///
    /// Email uniqueness is the only precondition besides the password policy.
    pub fn register(&self, email: &str, password: &str) -> AuthResult<User> {
        if self.store.find_by_email(email)?.is_some() {
            log_event_with_fields(Event::RegistrationRejected, &[("reason", "duplicate_email")]);
            return Err(AuthError::AlreadyExists);
        }

        if let Err(err) = self.password_policy.validate(password) {
            log_event_with_fields(Event::RegistrationRejected, &[("reason", "weak_password")]);
            return Err(err);
        }

        let hashed_password = self.hasher.hash(password)?;
        let user = self.store.insert(NewUser {
            email: email.to_string(),
            hashed_password,
        })?;

        let id = user.id.to_string();
        log_event_with_fields(Event::UserRegistered, &[("user_id", id.as_str()), ("email", email)]);
        Ok(user)
    }

    /// Check an email/password pair
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    /// Only store failures produce `Err`.
    pub fn validate_credentials(&self, email: &str, password: &str) -> AuthResult<bool> {
        match self.store.find_by_email(email)? {
            Some(user) => Ok(self.hasher.verify(&user.hashed_password, password)),
            None => {
                self.burn_verification(password);
                Ok(false)
            }
        }
    }

    /// Start a session for the user with this email
    ///
    /// Replaces any session the user already had. `None` if no such user.
    pub fn create_session(&self, email: &str) -> AuthResult<Option<String>> {
        let user = match self.store.find_by_email(email)? {
            Some(user) => user,
            None => return Ok(None),
        };

        let (token, token_hash) = self.unique_token(TokenKind::Session, user.id)?;
        self.store.update(
            user.id,
            UserChanges::new().session_token_hash(Some(token_hash)),
        )?;

        let id = user.id.to_string();
        log_event_with_fields(Event::SessionCreated, &[("user_id", id.as_str())]);
        Ok(Some(token))
    }

    /// Look up the user behind a session token
    pub fn resolve_session(&self, token: &str) -> AuthResult<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.store.find_by_session_token(&hash_token(token))
    }

    /// End the session of a user
    ///
    /// Idempotent: absent id, unknown id, and no live session are all no-ops.
    pub fn destroy_session(&self, user_id: Option<UserId>) -> AuthResult<()> {
        let Some(user_id) = user_id else {
            return Ok(());
        };

        match self
            .store
            .update(user_id, UserChanges::new().session_token_hash(None))
        {
            Ok(()) => {
                let id = user_id.to_string();
                log_event_with_fields(Event::SessionDestroyed, &[("user_id", id.as_str())]);
                Ok(())
            }
            Err(AuthError::NotFound) => {
                let id = user_id.to_string();
                Logger::warn("SESSION_DESTROY_UNKNOWN_USER", &[("user_id", id.as_str())]);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Issue a single-use password reset token
    pub fn issue_reset_token(&self, email: &str) -> AuthResult<String> {
        let user = self
            .store
            .find_by_email(email)?
            .ok_or(AuthError::NotFound)?;

        let (token, token_hash) = self.unique_token(TokenKind::Reset, user.id)?;
        self.store
            .update(user.id, UserChanges::new().reset_token_hash(Some(token_hash)))?;

        let id = user.id.to_string();
        log_event_with_fields(Event::ResetTokenIssued, &[("user_id", id.as_str())]);
        Ok(token)
    }

    /// Redeem a reset token for a new password
    ///
    /// The new hash and the cleared token land in one store update. If the
    /// new password is rejected, the token is still cleared before the error
    /// is returned.
    pub fn consume_reset_token(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let user = if token.is_empty() {
            None
        } else {
            self.store.find_by_reset_token(&hash_token(token))?
        };

        let Some(user) = user else {
            log_event_with_fields(Event::ResetTokenRejected, &[("reason", "unknown_token")]);
            return Err(AuthError::InvalidToken);
        };

        let new_hash = self
            .password_policy
            .validate(new_password)
            .and_then(|()| self.hasher.hash(new_password));

        let id = user.id.to_string();
        match new_hash {
            Ok(hash) => {
                self.store.update(
                    user.id,
                    UserChanges::new()
                        .hashed_password(hash)
                        .reset_token_hash(None),
                )?;
                log_event_with_fields(Event::PasswordReset, &[("user_id", id.as_str())]);
                Ok(())
            }
            Err(err) => {
                self.store
                    .update(user.id, UserChanges::new().reset_token_hash(None))?;
                log_event_with_fields(
                    Event::ResetTokenRejected,
                    &[("reason", "password_rejected"), ("user_id", id.as_str())],
                );
                Err(err)
            }
        }
    }

    /// Fetch a user by id
    pub fn user_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        self.store.find_by_id(id)
    }

    /// Fetch a user by email
    pub fn user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        self.store.find_by_email(email)
    }

    /// Draw a token whose digest no other user holds in the given column
    fn unique_token(&self, kind: TokenKind, owner: UserId) -> AuthResult<(String, String)> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = generate_token();
            let token_hash = hash_token(&token);

            let holder = match kind {
                TokenKind::Session => self.store.find_by_session_token(&token_hash)?,
                TokenKind::Reset => self.store.find_by_reset_token(&token_hash)?,
            };

            match holder {
                Some(other) if other.id != owner => continue,
                _ => return Ok((token, token_hash)),
            }
        }

        Logger::error("TOKEN_GENERATION_EXHAUSTED", &[("kind", kind.as_str())]);
        Err(AuthError::TokenGenerationFailed)
    }

    /// Spend roughly one verification worth of time for an unknown email
    fn burn_verification(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hasher.hash(TIMING_DUMMY_PASSWORD).ok());
        if let Some(hash) = dummy {
            let _ = self.hasher.verify(hash, password);
        }
    }
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Session => "session",
            TokenKind::Reset => "reset",
        }
    }
}
