//! The MSEL document model (§3): a timeline of timed injects, each
//! carrying an ordered list of actions.

use chrono::{DateTime, Utc};
use cyroid_common::ids::{InjectId, MselId, RangeId};
use cyroid_common::status::InjectStatus;
use serde::{Deserialize, Serialize};

/// One dispatchable step within an inject (§3's `Action`).
///
/// Modeled as a closed tagged variant per the design notes' "dynamic
/// fields" guidance: unknown action kinds are rejected by the parser
/// rather than carried through as an opaque bag of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Execute a shell command on a named VM.
    RunCommand {
        /// Hostname of the target VM within the range.
        target_hostname: String,
        /// Command to run.
        command: String,
    },
    /// Copy an artifact onto a named VM at a given path.
    PlaceFile {
        /// Artifact name, matched by exact string equality.
        filename: String,
        /// Hostname of the target VM within the range.
        target_hostname: String,
        /// Destination path inside the container.
        target_path: String,
    },
}

impl Action {
    /// The hostname this action targets, regardless of kind.
    #[must_use]
    pub fn target_hostname(&self) -> &str {
        match self {
            Self::RunCommand { target_hostname, .. } | Self::PlaceFile { target_hostname, .. } => {
                target_hostname
            }
        }
    }
}

/// One timed scenario event (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inject {
    /// Stable identifier.
    pub id: InjectId,
    /// Owning MSEL document.
    pub msel_id: MselId,
    /// 1-based position in document order.
    pub sequence: u32,
    /// Offset from exercise start, in minutes (`60*H + MM` from the `T+H:MM` header).
    pub inject_time_minutes: u64,
    /// Section title.
    pub title: String,
    /// Free text between the title and the `**Actions:**` marker.
    pub description: String,
    /// Actions to dispatch, in the order execution should attempt them.
    pub actions: Vec<Action>,
    /// Lifecycle status.
    pub status: InjectStatus,
    /// Timestamp execution began, set when `status` first becomes `Executing`.
    pub executed_at: Option<DateTime<Utc>>,
    /// Human-readable per-action execution summary, set once terminal.
    pub execution_log: Option<String>,
}

impl Inject {
    /// Whether this inject may currently be executed (§4.6: "executable
    /// iff its status is Pending").
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        matches!(self.status, InjectStatus::Pending)
    }

    /// Whether this inject may currently be skipped (§4.6: "a Pending
    /// inject may be skipped; non-Pending injects may not be skipped").
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self.status, InjectStatus::Pending)
    }
}

/// A parsed scenario timeline (§3's `MSEL`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Msel {
    /// Stable identifier.
    pub id: MselId,
    /// Owning range; at most one MSEL per range.
    pub range_id: RangeId,
    /// Display name.
    pub name: String,
    /// The raw document text the injects were parsed from, retained
    /// verbatim so re-import/diffing is possible.
    pub raw_text: String,
    /// Injects, in document order.
    pub injects: Vec<Inject>,
}
