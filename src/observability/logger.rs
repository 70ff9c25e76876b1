//! Structured JSON logger
//!
//! One line per event: `event` first, `severity` second, then the caller's
//! fields sorted by key. Values of PII-named fields never reach the output.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use super::redact::{RedactingFormatter, PII_FIELDS};

/// Log severity levels, named as they appear in text log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    fn to_stderr(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set once stdout is reserved for program output
static ALL_TO_STDERR: AtomicBool = AtomicBool::new(false);

/// Writes structured events to stdout, or stderr from ERROR upwards
pub struct Logger;

impl Logger {
    /// Send every severity to stderr for the rest of the process
    pub fn route_all_to_stderr() {
        ALL_TO_STDERR.store(true, Ordering::Relaxed);
    }

    pub fn writes_to_stderr(severity: Severity) -> bool {
        severity.to_stderr() || ALL_TO_STDERR.load(Ordering::Relaxed)
    }

    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = render(severity, event, fields);
        if Self::writes_to_stderr(severity) {
            let _ = io::stderr().lock().write_all(line.as_bytes());
        } else {
            let mut out = io::stdout().lock();
            let _ = out.write_all(line.as_bytes());
            let _ = out.flush();
        }
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warning, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Build one newline-terminated JSON object
pub(crate) fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);

    let mut line = format!(
        "{{\"event\":{},\"severity\":\"{}\"",
        json_string(event),
        severity
    );
    for (key, value) in sorted {
        let value = if PII_FIELDS.contains(key) {
            RedactingFormatter::REDACTION
        } else {
            *value
        };
        line.push(',');
        line.push_str(&json_string(key));
        line.push(':');
        line.push_str(&json_string(value));
    }
    line.push_str("}\n");
    line
}

fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}
