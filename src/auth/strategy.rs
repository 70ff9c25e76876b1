//! # Authentication Strategies
//!
//! One capability trait, several interchangeable implementations chosen by
//! [`AuthType`]. A router extracts a [`RequestCredentials`] from each inbound
//! request and hands it to [`authorize_request`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;

use super::authority::SessionAuthority;
use super::config::{AuthConfig, AuthType};
use super::errors::{AuthError, AuthResult};
use super::session::{SessionConfig, SessionRegistry};
use super::user::User;
use crate::observability::{log_event_with_fields, Event};

/// The parts of an inbound request a strategy may look at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub path: String,
    pub authorization: Option<String>,
    pub cookies: HashMap<String, String>,
}

impl RequestCredentials {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Whether `path` needs authentication given the excluded list
///
/// Matching ignores a trailing slash; an entry ending in `*` matches every
/// path that starts with the part before the `*`.
pub fn require_auth(path: &str, excluded_paths: &[String]) -> bool {
    if path.is_empty() || excluded_paths.is_empty() {
        return true;
    }

    let path = with_trailing_slash(path);
    !excluded_paths.iter().any(|entry| match entry.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => with_trailing_slash(entry) == path,
    })
}

fn with_trailing_slash(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("{}/", path))
    }
}

/// Capability interface shared by every authentication strategy
pub trait AuthStrategy: Send + Sync {
    /// Which configured variant this is
    fn auth_type(&self) -> AuthType;

    /// Cookie carrying the session token, for cookie-based strategies
    fn session_name(&self) -> Option<&str> {
        None
    }

    fn require_auth(&self, path: &str, excluded_paths: &[String]) -> bool {
        require_auth(path, excluded_paths)
    }

    /// Non-empty `Authorization` header, if present
    fn authorization_header<'a>(&self, request: &'a RequestCredentials) -> Option<&'a str> {
        request.authorization.as_deref().filter(|h| !h.is_empty())
    }

    /// Non-empty session cookie, if this strategy uses one
    fn session_cookie<'a>(&self, request: &'a RequestCredentials) -> Option<&'a str> {
        let name = self.session_name()?;
        request.cookie(name).filter(|v| !v.is_empty())
    }

    /// The user this request authenticates as
    fn current_user(&self, request: &RequestCredentials) -> AuthResult<Option<User>>;

    /// Start a session for a user who just proved their credentials
    fn create_session(&self, _user: &User) -> AuthResult<Option<String>> {
        Ok(None)
    }

    /// End the session carried by the request; false if there was none
    fn destroy_session(&self, _request: &RequestCredentials) -> AuthResult<bool> {
        Ok(false)
    }
}

/// Apply the request gate
///
/// `Ok(None)` means the path is public (or no strategy is configured).
/// Protected paths without any credentials fail `AuthenticationRequired`;
/// credentials that resolve to nobody fail `Forbidden`.
pub fn authorize_request(
    strategy: Option<&dyn AuthStrategy>,
    request: &RequestCredentials,
    excluded_paths: &[String],
) -> AuthResult<Option<User>> {
    let Some(strategy) = strategy else {
        return Ok(None);
    };

    if !strategy.require_auth(&request.path, excluded_paths) {
        return Ok(None);
    }

    if strategy.authorization_header(request).is_none()
        && strategy.session_cookie(request).is_none()
    {
        log_event_with_fields(
            Event::RequestDenied,
            &[("path", request.path.as_str()), ("status", "401")],
        );
        return Err(AuthError::AuthenticationRequired);
    }

    match strategy.current_user(request)? {
        Some(user) => Ok(Some(user)),
        None => {
            log_event_with_fields(
                Event::RequestDenied,
                &[("path", request.path.as_str()), ("status", "403")],
            );
            Err(AuthError::Forbidden)
        }
    }
}

/// Build the strategy named by the configuration
pub fn build_strategy(
    config: &AuthConfig,
    authority: Arc<SessionAuthority>,
) -> Option<Box<dyn AuthStrategy>> {
    let session_name = config.session_name.clone();
    let strategy: Box<dyn AuthStrategy> = match config.auth_type {
        AuthType::None => return None,
        AuthType::Auth => Box::new(NoAuth),
        AuthType::BasicAuth => Box::new(BasicAuth::new(authority)),
        AuthType::SessionAuth => Box::new(SessionAuth::new(authority, session_name)),
        AuthType::SessionExpAuth => Box::new(SessionExpAuth::new(
            authority,
            session_name,
            config.session_duration_secs,
        )),
        AuthType::SessionDbAuth => Box::new(SessionDbAuth::new(authority, session_name)),
    };
    Some(strategy)
}

// ==================
// No-auth
// ==================

/// Base strategy: paths can be protected but nobody is ever identified
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl AuthStrategy for NoAuth {
    fn auth_type(&self) -> AuthType {
        AuthType::Auth
    }

    fn current_user(&self, _request: &RequestCredentials) -> AuthResult<Option<User>> {
        Ok(None)
    }
}

// ==================
// Basic auth
// ==================

/// `Authorization: Basic base64(email:password)` on every request
pub struct BasicAuth {
    authority: Arc<SessionAuthority>,
}

impl BasicAuth {
    pub fn new(authority: Arc<SessionAuthority>) -> Self {
        Self { authority }
    }

    /// The base64 payload after the `Basic ` scheme
    pub fn extract_base64_authorization_header(header: &str) -> Option<&str> {
        header.strip_prefix("Basic ").filter(|p| !p.is_empty())
    }

    /// Decode the payload as UTF-8
    pub fn decode_base64_authorization_header(encoded: &str) -> Option<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Split `email:password` at the first colon
    pub fn extract_user_credentials(decoded: &str) -> Option<(&str, &str)> {
        decoded.split_once(':')
    }

    /// Resolve credentials to a user, or nobody if they do not check out
    pub fn user_object_from_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<User>> {
        if !self.authority.validate_credentials(email, password)? {
            return Ok(None);
        }
        self.authority.user_by_email(email)
    }
}

impl AuthStrategy for BasicAuth {
    fn auth_type(&self) -> AuthType {
        AuthType::BasicAuth
    }

    fn current_user(&self, request: &RequestCredentials) -> AuthResult<Option<User>> {
        let credentials = self
            .authorization_header(request)
            .and_then(Self::extract_base64_authorization_header)
            .and_then(Self::decode_base64_authorization_header);

        let Some(decoded) = credentials else {
            return Ok(None);
        };

        match Self::extract_user_credentials(&decoded) {
            Some((email, password)) => self.user_object_from_credentials(email, password),
            None => Ok(None),
        }
    }
}

// ==================
// In-memory session auth
// ==================

/// Cookie sessions held in a registry owned by this strategy
pub struct SessionAuth {
    authority: Arc<SessionAuthority>,
    registry: SessionRegistry,
    session_name: String,
}

impl SessionAuth {
    pub fn new(authority: Arc<SessionAuthority>, session_name: impl Into<String>) -> Self {
        Self::with_config(authority, session_name, SessionConfig::default())
    }

    pub fn with_config(
        authority: Arc<SessionAuthority>,
        session_name: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            authority,
            registry: SessionRegistry::new(config),
            session_name: session_name.into(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

impl AuthStrategy for SessionAuth {
    fn auth_type(&self) -> AuthType {
        AuthType::SessionAuth
    }

    fn session_name(&self) -> Option<&str> {
        Some(self.session_name.as_str())
    }

    fn current_user(&self, request: &RequestCredentials) -> AuthResult<Option<User>> {
        let Some(token) = self.session_cookie(request) else {
            return Ok(None);
        };

        match self.registry.user_id_for(token)? {
            Some(user_id) => self.authority.user_by_id(user_id),
            None => Ok(None),
        }
    }

    fn create_session(&self, user: &User) -> AuthResult<Option<String>> {
        let token = self.registry.create(user.id)?;
        let id = user.id.to_string();
        log_event_with_fields(
            Event::SessionCreated,
            &[("store", "memory"), ("user_id", id.as_str())],
        );
        Ok(Some(token))
    }

    fn destroy_session(&self, request: &RequestCredentials) -> AuthResult<bool> {
        let Some(token) = self.session_cookie(request) else {
            return Ok(false);
        };

        let destroyed = self.registry.destroy(token)?;
        if destroyed {
            log_event_with_fields(Event::SessionDestroyed, &[("store", "memory")]);
        }
        Ok(destroyed)
    }
}

/// [`SessionAuth`] whose sessions lapse after a fixed duration
pub struct SessionExpAuth {
    inner: SessionAuth,
}

impl SessionExpAuth {
    /// `duration_secs <= 0` keeps sessions until destroyed
    pub fn new(
        authority: Arc<SessionAuthority>,
        session_name: impl Into<String>,
        duration_secs: i64,
    ) -> Self {
        Self {
            inner: SessionAuth::with_config(
                authority,
                session_name,
                SessionConfig::from_secs(duration_secs),
            ),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.inner.registry()
    }
}

impl AuthStrategy for SessionExpAuth {
    fn auth_type(&self) -> AuthType {
        AuthType::SessionExpAuth
    }

    fn session_name(&self) -> Option<&str> {
        self.inner.session_name()
    }

    fn current_user(&self, request: &RequestCredentials) -> AuthResult<Option<User>> {
        self.inner.current_user(request)
    }

    fn create_session(&self, user: &User) -> AuthResult<Option<String>> {
        self.inner.create_session(user)
    }

    fn destroy_session(&self, request: &RequestCredentials) -> AuthResult<bool> {
        self.inner.destroy_session(request)
    }
}

// ==================
// Store-backed session auth
// ==================

/// Cookie sessions persisted on the user record through the authority
pub struct SessionDbAuth {
    authority: Arc<SessionAuthority>,
    session_name: String,
}

impl SessionDbAuth {
    pub fn new(authority: Arc<SessionAuthority>, session_name: impl Into<String>) -> Self {
        Self {
            authority,
            session_name: session_name.into(),
        }
    }
}

impl AuthStrategy for SessionDbAuth {
    fn auth_type(&self) -> AuthType {
        AuthType::SessionDbAuth
    }

    fn session_name(&self) -> Option<&str> {
        Some(self.session_name.as_str())
    }

    fn current_user(&self, request: &RequestCredentials) -> AuthResult<Option<User>> {
        match self.session_cookie(request) {
            Some(token) => self.authority.resolve_session(token),
            None => Ok(None),
        }
    }

    fn create_session(&self, user: &User) -> AuthResult<Option<String>> {
        self.authority.create_session(&user.email)
    }

    fn destroy_session(&self, request: &RequestCredentials) -> AuthResult<bool> {
        let Some(user) = self.current_user(request)? else {
            return Ok(false);
        };
        self.authority.destroy_session(Some(user.id))?;
        Ok(true)
    }
}
