//! Telemetry and structured logging for trackwatch.
//!
//! Handles secret redaction, console plus rolling NDJSON file output, and tracker event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, TrackerEvent};
pub use logger::init_logger;
pub use redact::{presence, redact_sensitive_data};
