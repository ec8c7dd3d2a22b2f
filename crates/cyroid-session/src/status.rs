//! Range status WebSocket (§4.7): samples VM and range statuses every
//! 2s and pushes a JSON patch only when the observed status set changes
//! from the last one sent (status coalescing, §5).

use std::collections::BTreeMap;
use std::time::Duration;

use cyroid_common::ids::{RangeId, VmId};
use cyroid_common::status::{RangeStatus, VmStatus};
use serde::{Deserialize, Serialize};

use crate::ws::WsConnection;

/// The polling interval for range status snapshots (§4.7, §5).
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A point-in-time snapshot of a range's and its VMs' statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// The range's current lifecycle status.
    pub range_status: RangeStatus,
    /// Current status per VM, keyed by VM id for deterministic ordering
    /// and cheap equality comparison against the previous snapshot.
    pub vm_statuses: BTreeMap<VmId, VmStatus>,
}

/// Source of truth the status poller samples from. Implemented by
/// whatever store/facade holds live range and VM state; kept as a trait
/// so the coalescing logic is testable without a real repository.
#[async_trait::async_trait]
pub trait RangeStatusSource: Send + Sync {
    /// Fetches the current status snapshot for `range_id`.
    ///
    /// # Errors
    /// Returns an error if the range no longer exists.
    async fn snapshot(&self, range_id: RangeId) -> cyroid_common::error::Result<StatusSnapshot>;
}

/// Runs the status poller until the client disconnects, the source
/// errors (range deleted), or the connection errors on send. Only sends
/// a snapshot when it differs from the last one successfully sent.
pub async fn run_status_poller(
    mut client: Box<dyn WsConnection>,
    source: &dyn RangeStatusSource,
    range_id: RangeId,
) {
    let mut last_sent: Option<StatusSnapshot> = None;
    loop {
        match source.snapshot(range_id).await {
            Ok(snapshot) => {
                if last_sent.as_ref() != Some(&snapshot) {
                    let Ok(body) = serde_json::to_string(&snapshot) else {
                        break;
                    };
                    if client.send_text(body).await.is_err() {
                        break;
                    }
                    last_sent = Some(snapshot);
                }
            }
            Err(err) => {
                tracing::debug!(%err, %range_id, "status poller stopping: source error");
                let _ = client
                    .close(cyroid_common::constants::WS_CLOSE_NOT_FOUND, "range not found")
                    .await;
                break;
            }
        }
        tokio::time::sleep(STATUS_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::error::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct FakeWs {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl WsConnection for FakeWs {
        async fn send_text(&mut self, text: String) -> Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
        async fn send_binary(&mut self, _data: Vec<u8>) -> Result<()> {
            Ok(())
        }
        async fn recv(&mut self) -> Result<Option<crate::ws::WsMessage>> {
            Ok(None)
        }
        async fn close(&mut self, _code: u16, _reason: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeSource {
        snapshots: StdMutex<VecDeque<Result<StatusSnapshot>>>,
    }

    #[async_trait::async_trait]
    impl RangeStatusSource for FakeSource {
        async fn snapshot(&self, _range_id: RangeId) -> Result<StatusSnapshot> {
            self.snapshots
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(cyroid_common::error::CyroidError::not_found("range", "exhausted")))
        }
    }

    fn snapshot(range_status: RangeStatus, vm: (VmId, VmStatus)) -> StatusSnapshot {
        let mut vm_statuses = BTreeMap::new();
        vm_statuses.insert(vm.0, vm.1);
        StatusSnapshot { range_status, vm_statuses }
    }

    #[tokio::test]
    async fn sends_once_per_distinct_snapshot_then_stops_on_source_error() {
        let vm_id = VmId::new();
        let range_id = RangeId::new();
        let source = FakeSource {
            snapshots: StdMutex::new(VecDeque::from([
                Ok(snapshot(RangeStatus::Running, (vm_id, VmStatus::Running))),
                Ok(snapshot(RangeStatus::Running, (vm_id, VmStatus::Running))),
                Ok(snapshot(RangeStatus::Stopped, (vm_id, VmStatus::Stopped))),
                Err(cyroid_common::error::CyroidError::not_found("range", "gone")),
            ])),
        };
        let client = Box::new(FakeWs { sent: StdMutex::new(Vec::new()) });

        run_status_poller(client, &source, range_id).await;
    }
}
