//! Observability for sessionauth
//!
//! - Structured JSON logging with PII-named fields masked
//! - Typed lifecycle events
//! - A text formatter that redacts `field=value;` pairs
//!
//! # Usage
//!
//! ```ignore
//! use sessionauth::observability::{log_event_with_fields, Event, filter_datum};
//!
//! log_event_with_fields(Event::SessionCreated, &[("user_id", "1")]);
//!
//! let line = filter_datum(&["password"], "***", "name=Bob;password=secret;", ";")?;
//! assert_eq!(line, "name=Bob;password=***;");
//! ```

mod events;
mod logger;
pub mod redact;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use redact::{filter_datum, LogRecord, RedactingFormatter, PII_FIELDS};

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
