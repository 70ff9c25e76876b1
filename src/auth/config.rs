//! Authentication configuration
//!
//! Loaded from a JSON file or from the process environment. Every field has
//! a default, so `{}` is a valid configuration file.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::crypto::PasswordPolicy;
use super::errors::{AuthError, AuthResult};
use crate::observability::{log_event_with_fields, Event};

/// Which [`AuthStrategy`](super::strategy::AuthStrategy) guards requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No strategy; every request passes
    None,
    /// Base strategy: paths may require auth but nobody is ever identified
    Auth,
    /// HTTP Basic credentials checked on every request
    BasicAuth,
    /// Cookie sessions held in process memory
    SessionAuth,
    /// Cookie sessions held in process memory with a lifetime
    SessionExpAuth,
    /// Cookie sessions persisted on the user record
    SessionDbAuth,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Auth => "auth",
            AuthType::BasicAuth => "basic_auth",
            AuthType::SessionAuth => "session_auth",
            AuthType::SessionExpAuth => "session_exp_auth",
            AuthType::SessionDbAuth => "session_db_auth",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AuthType::None),
            "auth" => Ok(AuthType::Auth),
            "basic_auth" => Ok(AuthType::BasicAuth),
            "session_auth" => Ok(AuthType::SessionAuth),
            "session_exp_auth" => Ok(AuthType::SessionExpAuth),
            "session_db_auth" => Ok(AuthType::SessionDbAuth),
            other => Err(AuthError::InvalidConfig(format!(
                "Unknown auth_type: '{}'",
                other
            ))),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Strategy selection (default: "session_db_auth")
    #[serde(default = "default_auth_type")]
    pub auth_type: AuthType,

    /// Name of the cookie carrying the session token
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Session lifetime for `session_exp_auth`; 0 disables expiry
    #[serde(default)]
    pub session_duration_secs: i64,

    /// Paths that never require authentication
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// Rules applied on registration and password reset
    #[serde(default)]
    pub password_policy: PasswordPolicy,
}

fn default_auth_type() -> AuthType {
    AuthType::SessionDbAuth
}

fn default_session_name() -> String {
    "_my_session_id".to_string()
}

fn default_excluded_paths() -> Vec<String> {
    vec![
        "/api/v1/status/".to_string(),
        "/api/v1/unauthorized/".to_string(),
        "/api/v1/forbidden/".to_string(),
        "/api/v1/auth_session/login/".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: default_auth_type(),
            session_name: default_session_name(),
            session_duration_secs: 0,
            excluded_paths: default_excluded_paths(),
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> AuthResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AuthError::InvalidConfig(format!("Failed to read config: {}", e)))?;

        let config: AuthConfig = serde_json::from_str(&content)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        let path = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("auth_type", config.auth_type.as_str()), ("path", path.as_str())],
        );
        Ok(config)
    }

    /// Read `AUTH_TYPE`, `SESSION_NAME`, `SESSION_DURATION` over the defaults
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(auth_type) = lookup("AUTH_TYPE") {
            config.auth_type = auth_type.trim().parse()?;
        }

        if let Some(name) = lookup("SESSION_NAME") {
            config.session_name = name;
        }

        if let Some(duration) = lookup("SESSION_DURATION") {
            config.session_duration_secs = duration.trim().parse().map_err(|_| {
                AuthError::InvalidConfig(format!("SESSION_DURATION is not an integer: '{}'", duration))
            })?;
        }

        config.validate()?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("auth_type", config.auth_type.as_str()), ("source", "env")],
        );
        Ok(config)
    }

    fn validate(&self) -> AuthResult<()> {
        if self.session_name.trim().is_empty() {
            return Err(AuthError::InvalidConfig(
                "session_name must not be empty".to_string(),
            ));
        }

        if self
            .session_name
            .chars()
            .any(|c| c.is_whitespace() || c == ';' || c == '=' || c == ',')
        {
            return Err(AuthError::InvalidConfig(format!(
                "session_name is not a valid cookie name: '{}'",
                self.session_name
            )));
        }

        if let Some(path) = self.excluded_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(AuthError::InvalidConfig(format!(
                "excluded path must start with '/': '{}'",
                path
            )));
        }

        Ok(())
    }
}
