//! Telemetry and structured logging components for TaxWise.
//!
//! Handles log redaction, JSON output generation, file rotation, and insight lifecycle logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{InsightEvent, InsightEventLogger, InsightLogEntry};
pub use logger::{init_logger, LogGuard};
pub use redact::redact_sensitive_data;
