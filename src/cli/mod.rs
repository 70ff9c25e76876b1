//! CLI module for sessionauth
//!
//! Provides command-line interface for:
//! - redact: Mask sensitive `field=value` pairs in log lines
//! - hash-password: Hash one password from stdin
//! - start: Serve JSON auth requests against an in-memory store

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{hash_password, redact, run, run_command, serve, start, RequestHandler};
pub use errors::{CliError, CliResult};
pub use io::{read_line, read_requests, write_json};
