//! Observable authentication events
//!
//! Every state transition the authority performs maps to exactly one event.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// Request loop ready for input
    Serving,

    // Registration
    /// New user stored
    UserRegistered,
    /// Registration refused (duplicate email or weak password)
    RegistrationRejected,

    // Sessions
    /// Session token issued
    SessionCreated,
    /// Session token cleared
    SessionDestroyed,

    // Password reset
    /// Reset token issued
    ResetTokenIssued,
    /// Password replaced through a reset token
    PasswordReset,
    /// Reset token presented but unknown or unusable
    ResetTokenRejected,

    // Request gate
    /// Protected request refused
    RequestDenied,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "SESSIONAUTH_SERVING",
            Event::UserRegistered => "USER_REGISTERED",
            Event::RegistrationRejected => "REGISTRATION_REJECTED",
            Event::SessionCreated => "SESSION_CREATED",
            Event::SessionDestroyed => "SESSION_DESTROYED",
            Event::ResetTokenIssued => "RESET_TOKEN_ISSUED",
            Event::PasswordReset => "PASSWORD_RESET",
            Event::ResetTokenRejected => "RESET_TOKEN_REJECTED",
            Event::RequestDenied => "REQUEST_DENIED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RegistrationRejected | Event::ResetTokenRejected | Event::RequestDenied => {
                Severity::Warning
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::Serving,
            Event::UserRegistered,
            Event::RegistrationRejected,
            Event::SessionCreated,
            Event::SessionDestroyed,
            Event::ResetTokenIssued,
            Event::PasswordReset,
            Event::ResetTokenRejected,
            Event::RequestDenied,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_rejections_are_warnings() {
        assert_eq!(Event::ResetTokenRejected.severity(), Severity::Warning);
        assert_eq!(Event::RequestDenied.severity(), Severity::Warning);
        assert_eq!(Event::SessionCreated.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::SessionCreated), "SESSION_CREATED");
    }
}
