//! CLI argument definitions using clap
//!
//! Commands:
//! - sessionauth redact [--fields a,b] [--separator ;] [--redaction ***]
//! - sessionauth hash-password
//! - sessionauth start [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sessionauth - session and reset-token authority
#[derive(Parser, Debug)]
#[command(name = "sessionauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Redact sensitive `field=value` pairs from log lines on stdin
    Redact {
        /// Fields to redact (default: name,email,phone,ssn,password)
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        /// Separator ending each pair
        #[arg(long, default_value = ";")]
        separator: String,

        /// Replacement for redacted values
        #[arg(long, default_value = "***")]
        redaction: String,
    },

    /// Hash one password read from stdin
    HashPassword,

    /// Serve JSON auth requests from stdin against an in-memory store
    Start {
        /// Path to configuration file (default: read from environment)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
