//! # Auth Errors
//!
//! Credential checks are deliberately NOT represented here as a distinct
//! "wrong password" / "unknown email" pair: `validate_credentials` returns a
//! plain `bool`, and routers map `false` to [`AuthError::InvalidCredentials`].

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures of the session authority and the strategies built on it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Registration for an email that already has an account
    #[error("email already registered")]
    AlreadyExists,

    /// Lookup or update of a user that does not exist
    #[error("no such user")]
    NotFound,

    #[error("password rejected: {0}")]
    WeakPassword(String),

    /// Login failure; never says which half was wrong
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Protected resource requested without any credentials
    #[error("authentication required")]
    AuthenticationRequired,

    /// Credentials presented but nobody behind them
    #[error("forbidden")]
    Forbidden,

    /// Reset token unknown or already consumed
    #[error("invalid token")]
    InvalidToken,

    #[error("password hashing failed")]
    HashingFailed,

    /// No token unique across users after repeated draws
    #[error("token generation failed")]
    TokenGenerationFailed,

    #[error("storage failure: {0}")]
    StorageError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// HTTP status a router answers with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::WeakPassword(_) => 400,
            AuthError::InvalidCredentials | AuthError::AuthenticationRequired => 401,
            AuthError::Forbidden | AuthError::InvalidToken => 403,
            AuthError::NotFound => 404,
            AuthError::AlreadyExists => 409,
            AuthError::HashingFailed
            | AuthError::TokenGenerationFailed
            | AuthError::StorageError(_)
            | AuthError::InvalidConfig(_) => 500,
        }
    }

    /// Caller mistakes, as opposed to failures of the service itself
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub(crate) fn lock_poisoned() -> Self {
        AuthError::StorageError("lock poisoned".to_string())
    }
}

/// JSON error body handed back to HTTP clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let code = self.status_code();
        let body = Json(ErrorResponse::from(self));

        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_credential_failures_map_apart() {
        assert_eq!(AuthError::NotFound.status_code(), 404);
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::AuthenticationRequired.status_code(), 401);
        assert_eq!(AuthError::AlreadyExists.status_code(), 409);
        assert_eq!(AuthError::Forbidden.status_code(), 403);
        assert_eq!(AuthError::lock_poisoned().status_code(), 500);
    }

    #[test]
    fn test_client_errors() {
        assert!(AuthError::InvalidToken.is_client_error());
        assert!(AuthError::WeakPassword("short".into()).is_client_error());
        assert!(!AuthError::StorageError("disk".into()).is_client_error());
    }

    #[test]
    fn test_credential_failures_do_not_name_a_field() {
        for err in [AuthError::InvalidCredentials, AuthError::Forbidden, AuthError::InvalidToken] {
            let message = err.to_string();
            assert!(!message.contains("password"));
            assert!(!message.contains("email"));
        }
    }

    #[test]
    fn test_into_response_uses_status_code() {
        let response = AuthError::AlreadyExists.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AuthError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
