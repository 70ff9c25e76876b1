//! sessionauth - Session and reset-token authority
//!
//! Registers users, checks credentials, and tracks one live session token and
//! one single-use reset token per user. Strategies plug the authority into a
//! request router, and the observability module keeps PII out of the logs.

pub mod auth;
pub mod cli;
pub mod observability;
