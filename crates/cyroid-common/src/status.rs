//! Shared status and classification enums used across the data model.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    /// Created, not yet deployed.
    Draft,
    /// A deploy plan is in progress.
    Deploying,
    /// Deployed and serving.
    Running,
    /// Deployed but all VMs stopped.
    Stopped,
    /// Torn down; entities deleted but records may remain for audit.
    Archived,
    /// A lifecycle operation failed; requires operator intervention.
    Error,
}

impl RangeStatus {
    /// Whether `deploy` is a legal transition from this status.
    #[must_use]
    pub const fn can_deploy(self) -> bool {
        matches!(self, Self::Draft | Self::Stopped | Self::Error)
    }

    /// Whether `stop` is a legal transition from this status.
    #[must_use]
    pub const fn can_stop(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether `teardown` is a legal transition from this status.
    #[must_use]
    pub const fn can_teardown(self) -> bool {
        !matches!(self, Self::Deploying)
    }

    /// Whether `start` is a legal transition from this status.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Lifecycle status of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmStatus {
    /// Declared but no container has been created.
    Pending,
    /// Container create/start is in progress.
    Creating,
    /// Container is running.
    Running,
    /// Container exists but is stopped.
    Stopped,
    /// A lifecycle operation on this VM failed.
    Error,
}

/// Provisioning status of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// No runtime handle recorded.
    Unprovisioned,
    /// A runtime network handle exists.
    Provisioned,
}

/// Network isolation level, controlling egress and the `internal` flag
/// passed to the container runtime adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// No egress to the host or outside world.
    Complete,
    /// Restricted egress; still created as an internal runtime network.
    Controlled,
    /// Full egress; not an internal runtime network.
    Open,
}

impl IsolationLevel {
    /// Whether a network at this isolation level should be created with
    /// `internal = true` on the container runtime adapter.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Complete | Self::Controlled)
    }
}

/// Operating system family of a VM template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsKind {
    /// Linux-based.
    Linux,
    /// Windows-based.
    Windows,
    /// Neither, e.g. a custom ISO-booted image.
    Custom,
}

/// Synthesis mode for a VM, determining which of C5's three container
/// shapes is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmType {
    /// Plain container (e.g. a lightweight Linux workload).
    Container,
    /// KVM-accelerated Linux VM running inside a container (qemu-family image).
    LinuxVm,
    /// KVM-accelerated Windows VM running inside a container (dockur-family image).
    WindowsVm,
}

/// Display mode for a desktop-capable VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Web VNC console exposed via the reverse proxy.
    Desktop,
    /// Headless; no VNC console.
    Server,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::Server
    }
}

/// Classification of an uploaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A compiled or interpreted executable.
    Executable,
    /// A shell/Python/PowerShell script.
    Script,
    /// A document (PDF, Office, etc).
    Document,
    /// An archive of other files.
    Archive,
    /// A configuration file.
    Config,
    /// Anything not covered above.
    Other,
}

/// Risk indicator attached to an artifact by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactIndicator {
    /// Known safe.
    Safe,
    /// Potentially risky; handle with care.
    Suspicious,
    /// Known malicious; requires isolation discipline.
    Malicious,
}

/// Placement status of an artifact onto a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    /// Queued, not yet attempted.
    Pending,
    /// Copy to the container is underway.
    InProgress,
    /// Bytes landed at the target path.
    Placed,
    /// Placement confirmed by a follow-up check.
    Verified,
    /// Placement failed; see the recorded error text.
    Failed,
}

/// Status of a scenario inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectStatus {
    /// Not yet executed or skipped.
    Pending,
    /// Execution in progress.
    Executing,
    /// All actions succeeded.
    Completed,
    /// At least one action failed.
    Failed,
    /// Skipped by a user before execution.
    Skipped,
}

/// Transport protocol of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionProtocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// ICMP.
    Icmp,
}

/// Observed state of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Connection established.
    Established,
    /// Connection closed gracefully.
    Closed,
    /// Connection timed out.
    Timeout,
    /// Connection was reset.
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_deploy_legality_matches_state_diagram() {
        assert!(RangeStatus::Draft.can_deploy());
        assert!(RangeStatus::Stopped.can_deploy());
        assert!(RangeStatus::Error.can_deploy());
        assert!(!RangeStatus::Running.can_deploy());
        assert!(!RangeStatus::Deploying.can_deploy());
    }

    #[test]
    fn range_teardown_allowed_from_any_state_but_deploying() {
        assert!(!RangeStatus::Deploying.can_teardown());
        assert!(RangeStatus::Draft.can_teardown());
        assert!(RangeStatus::Running.can_teardown());
        assert!(RangeStatus::Stopped.can_teardown());
        assert!(RangeStatus::Error.can_teardown());
    }

    #[test]
    fn isolation_level_internal_flag() {
        assert!(IsolationLevel::Complete.is_internal());
        assert!(IsolationLevel::Controlled.is_internal());
        assert!(!IsolationLevel::Open.is_internal());
    }
}
