//! Insight Event Logger
//!
//! Structured lifecycle events for each insight call, emitted on the `insight_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use taxwise_core::InsightKind;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum InsightEvent {
    Dispatched,
    Succeeded,
    Failed {
        error_msg: String,
    },
    /// The result arrived after a newer document replaced the one it was for.
    Discarded,
}

#[derive(Debug, Serialize)]
pub struct InsightLogEntry {
    pub generation: u64,
    pub kind: InsightKind,
    pub timestamp: DateTime<Utc>,
    pub event: InsightEvent,
}

pub struct InsightEventLogger;

impl InsightEventLogger {
    /// Logs an insight lifecycle event, redacting any message text first.
    pub fn log_event(generation: u64, kind: InsightKind, mut event: InsightEvent) -> InsightLogEntry {
        if let InsightEvent::Failed { error_msg } = &mut event {
            *error_msg = redact_sensitive_data(error_msg);
        }

        let entry = InsightLogEntry {
            generation,
            kind,
            timestamp: Utc::now(),
            event,
        };

        let payload = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "insight_events", generation, kind = %kind, entry = %payload, "Insight event");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_event_is_redacted() {
        let entry = InsightEventLogger::log_event(
            3,
            InsightKind::Simplification,
            InsightEvent::Failed {
                error_msg: "bad image data:image/png;base64,aGVsbG8=".into(),
            },
        );
        match entry.event {
            InsightEvent::Failed { error_msg } => assert!(!error_msg.contains("aGVsbG8=")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_entry_serialization() {
        let entry = InsightEventLogger::log_event(1, InsightKind::Risk, InsightEvent::Discarded);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "risk");
        assert_eq!(json["event"]["type"], "Discarded");
    }
}
