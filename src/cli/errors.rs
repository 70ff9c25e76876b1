//! CLI-specific error types
//!
//! Every variant renders as `<code>: <detail>` and ends the process non-zero.

use std::io;

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be read or failed validation
    #[error("SESSIONAUTH_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// Redaction fields or separator could not be compiled
    #[error("SESSIONAUTH_CLI_CONFIG_ERROR: invalid redaction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("SESSIONAUTH_CLI_IO_ERROR: {0}")]
    Io(#[from] io::Error),

    #[error("SESSIONAUTH_CLI_IO_ERROR: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stdin closed before a required line arrived
    #[error("SESSIONAUTH_CLI_IO_ERROR: empty input")]
    EmptyInput,

    /// Authority failure outside the request loop
    #[error("SESSIONAUTH_CLI_AUTH_FAILED: {0}")]
    Auth(AuthError),
}

impl CliError {
    /// The stable code prefix of the rendered message
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) | CliError::Pattern(_) => "SESSIONAUTH_CLI_CONFIG_ERROR",
            CliError::Io(_) | CliError::Json(_) | CliError::EmptyInput => {
                "SESSIONAUTH_CLI_IO_ERROR"
            }
            CliError::Auth(_) => "SESSIONAUTH_CLI_AUTH_FAILED",
        }
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidConfig(msg) => CliError::Config(msg),
            other => CliError::Auth(other),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_code() {
        let err = CliError::EmptyInput;
        assert_eq!(err.to_string(), "SESSIONAUTH_CLI_IO_ERROR: empty input");
        assert!(err.to_string().starts_with(err.code()));
    }

    #[test]
    fn test_invalid_config_becomes_config_error() {
        let err = CliError::from(AuthError::InvalidConfig("bad".into()));
        assert!(matches!(err, CliError::Config(ref msg) if msg == "bad"));
        assert_eq!(err.code(), "SESSIONAUTH_CLI_CONFIG_ERROR");

        let err = CliError::from(AuthError::HashingFailed);
        assert_eq!(err.code(), "SESSIONAUTH_CLI_AUTH_FAILED");
    }

    #[test]
    fn test_io_error_converts() {
        let err: CliError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err.code(), "SESSIONAUTH_CLI_IO_ERROR");
        assert!(err.to_string().ends_with("pipe closed"));
    }
}
