//! The event-journal port (§4.8): a sink every lifecycle-mutating component
//! writes through, without depending on the journal's storage crate.

use crate::ids::{RangeId, VmId};

/// Enumerated event kinds, matching §4.8's closed set exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A range finished its deploy plan.
    RangeDeployed,
    /// A range transitioned to Running.
    RangeStarted,
    /// A range transitioned to Stopped.
    RangeStopped,
    /// A range finished its teardown plan.
    RangeTeardown,
    /// A VM's container was created.
    VmCreated,
    /// A VM transitioned to Running.
    VmStarted,
    /// A VM transitioned to Stopped.
    VmStopped,
    /// A VM's container was restarted.
    VmRestarted,
    /// A VM's lifecycle operation failed.
    VmError,
    /// A snapshot was committed from a running VM.
    SnapshotCreated,
    /// A VM was recreated from a snapshot image.
    SnapshotRestored,
    /// An artifact was copied into a VM's container.
    ArtifactPlaced,
    /// An inject finished executing with every action successful.
    InjectExecuted,
    /// An inject finished executing with at least one failed action.
    InjectFailed,
    /// A tracked connection opened.
    ConnectionEstablished,
    /// A tracked connection closed.
    ConnectionClosed,
}

impl EventKind {
    /// The wire/display name, matching §4.8's `SCREAMING_SNAKE_CASE` set.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RangeDeployed => "RANGE_DEPLOYED",
            Self::RangeStarted => "RANGE_STARTED",
            Self::RangeStopped => "RANGE_STOPPED",
            Self::RangeTeardown => "RANGE_TEARDOWN",
            Self::VmCreated => "VM_CREATED",
            Self::VmStarted => "VM_STARTED",
            Self::VmStopped => "VM_STOPPED",
            Self::VmRestarted => "VM_RESTARTED",
            Self::VmError => "VM_ERROR",
            Self::SnapshotCreated => "SNAPSHOT_CREATED",
            Self::SnapshotRestored => "SNAPSHOT_RESTORED",
            Self::ArtifactPlaced => "ARTIFACT_PLACED",
            Self::InjectExecuted => "INJECT_EXECUTED",
            Self::InjectFailed => "INJECT_FAILED",
            Self::ConnectionEstablished => "CONNECTION_ESTABLISHED",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
        }
    }
}

/// Sink for append-only event journal writes (§4.8, §9's "explicit
/// parameter, not implicit global" guidance).
///
/// Writes are synchronous with the lifecycle transition that triggered
/// them — the journal crate's store is expected to be a quick, locked,
/// in-process write, not a remote call.
pub trait EventRecorder: Send + Sync {
    /// Appends one event entry.
    fn record(&self, range_id: RangeId, vm_id: Option<VmId>, kind: EventKind, message: String);
}

/// An [`EventRecorder`] that discards everything, for call sites (tests,
/// dry-run tooling) that don't care about the journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl EventRecorder for NullRecorder {
    fn record(&self, _range_id: RangeId, _vm_id: Option<VmId>, _kind: EventKind, _message: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_names_match_screaming_snake_case() {
        assert_eq!(EventKind::RangeDeployed.as_str(), "RANGE_DEPLOYED");
        assert_eq!(EventKind::InjectFailed.as_str(), "INJECT_FAILED");
    }

    #[test]
    fn null_recorder_does_not_panic() {
        let recorder = NullRecorder;
        recorder.record(RangeId::new(), None, EventKind::RangeDeployed, "ok".into());
    }
}
