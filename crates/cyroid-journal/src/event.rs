//! Append-only event log entries (§3, §4.8).

use chrono::{DateTime, Utc};
use cyroid_common::event::EventKind;
use cyroid_common::ids::{EventId, RangeId, VmId};
use serde::{Deserialize, Serialize};

/// Extra structured data carried on an event entry.
///
/// A closed, externally-tagged enum per the design notes' "dynamic
/// fields... modeled as tagged variants; unknown inbound variants are
/// rejected rather than silently passed through" guidance — `serde`'s
/// externally-tagged enum deserialization already rejects an unrecognized
/// `kind` tag, which is exactly the rejection behavior called for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventExtra {
    /// No extra data.
    None,
    /// A process exit code, e.g. for a post-install script run.
    ExitCode {
        /// The exit code.
        code: i64,
    },
    /// A free-form message, e.g. an engine error string.
    Message {
        /// The message text.
        text: String,
    },
    /// A byte count, e.g. bytes transferred on a closed connection.
    Bytes {
        /// The byte count.
        count: u64,
    },
}

impl Default for EventExtra {
    fn default() -> Self {
        Self::None
    }
}

/// One append-only journal entry (§3's `EventLogEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Stable identifier.
    pub id: EventId,
    /// Owning range.
    pub range_id: RangeId,
    /// VM the event concerns, if any.
    pub vm_id: Option<VmId>,
    /// Event kind, from §4.8's enumerated set.
    pub kind: EventKind,
    /// Human-readable message.
    pub message: String,
    /// Structured extra data.
    pub extra: EventExtra,
    /// Time the event was recorded.
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    /// Builds a new entry stamped with the current time.
    #[must_use]
    pub fn new(range_id: RangeId, vm_id: Option<VmId>, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            range_id,
            vm_id,
            kind,
            message: message.into(),
            extra: EventExtra::None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches structured extra data to the entry.
    #[must_use]
    pub fn with_extra(mut self, extra: EventExtra) -> Self {
        self.extra = extra;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extra_tag_is_rejected_on_deserialize() {
        let json = serde_json::json!({"kind": "not_a_real_variant"});
        let result: Result<EventExtra, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn known_extra_tag_round_trips() {
        let extra = EventExtra::ExitCode { code: 17 };
        let json = serde_json::to_value(&extra).unwrap();
        let parsed: EventExtra = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, extra);
    }
}
