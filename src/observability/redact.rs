//! PII redaction for log lines
//!
//! Log lines carry `field=value<separator>` pairs. Sensitive fields keep
//! their name and separator but lose their value.

use chrono::{DateTime, Utc};
use regex::Regex;

use super::logger::Severity;

/// Fields treated as personally identifiable by default
pub const PII_FIELDS: [&str; 5] = ["name", "email", "phone", "ssn", "password"];

/// Replace the value of every listed field with `redaction`
///
/// The value is matched non-greedily up to the next `separator`; a trailing
/// pair with no separator after it is left as is. Fields and separator are
/// matched literally.
pub fn filter_datum<S: AsRef<str>>(
    fields: &[S],
    redaction: &str,
    message: &str,
    separator: &str,
) -> Result<String, regex::Error> {
    let formatter = RedactingFormatter::with_options(fields, redaction, separator)?;
    Ok(formatter.redact(message))
}

fn field_pattern(field: &str, separator: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        "{}=.*?{}",
        regex::escape(field),
        regex::escape(separator)
    ))
}

/// A single log record handed to a [`RedactingFormatter`]
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub name: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// Formats text log lines and redacts sensitive fields
///
/// Patterns are compiled once at construction.
#[derive(Debug, Clone)]
pub struct RedactingFormatter {
    fields: Vec<(String, Regex)>,
    redaction: String,
    separator: String,
}

impl RedactingFormatter {
    pub const REDACTION: &'static str = "***";
    pub const SEPARATOR: &'static str = ";";
    const PREFIX: &'static str = "[SESSIONAUTH]";

    /// Formatter with the default `***` marker and `;` separator
    pub fn new<S: AsRef<str>>(fields: &[S]) -> Result<Self, regex::Error> {
        Self::with_options(fields, Self::REDACTION, Self::SEPARATOR)
    }

    pub fn with_options<S: AsRef<str>>(
        fields: &[S],
        redaction: &str,
        separator: &str,
    ) -> Result<Self, regex::Error> {
        let fields = fields
            .iter()
            .map(|f| {
                let field = f.as_ref().to_string();
                field_pattern(&field, separator).map(|pattern| (field, pattern))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            fields,
            redaction: redaction.to_string(),
            separator: separator.to_string(),
        })
    }

    /// Formatter over [`PII_FIELDS`]
    pub fn pii() -> Result<Self, regex::Error> {
        Self::new(&PII_FIELDS)
    }

    /// Names of the fields this formatter redacts
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(f, _)| f.as_str())
    }

    /// Redact a bare message
    pub fn redact(&self, message: &str) -> String {
        let mut message = message.to_string();
        for (field, pattern) in &self.fields {
            let replacement = format!("{}={}{}", field, self.redaction, self.separator);
            message = pattern
                .replace_all(&message, regex::NoExpand(&replacement))
                .into_owned();
        }
        message
    }

    /// Render `[SESSIONAUTH] name LEVEL timestamp: message` with redaction
    pub fn format(&self, record: &LogRecord) -> String {
        let line = format!(
            "{} {} {} {}: {}",
            Self::PREFIX,
            record.name,
            record.severity,
            record.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            record.message
        );
        self.redact(&line)
    }
}
