//! An in-memory [`Repository`] reference implementation (§9.4): ordered
//! maps behind a mutex, not optimized, existing so every domain crate's
//! plans and filters have something concrete to run against outside of
//! each crate's own local test doubles.
//!
//! This is not a production store — there is no persistence, no
//! transactions, and no indexing beyond a linear scan per query. A
//! concrete persistent implementation is out of scope (§9.4).

use std::collections::BTreeMap;
use std::sync::Mutex;

use cyroid_auth::Principal;
use cyroid_common::error::{CyroidError, Result};
use cyroid_common::event::EventKind;
use cyroid_common::ids::{
    ArtifactId, InjectId, MselId, NetworkId, PrincipalId, RangeId, SnapshotId, TemplateId, VmId,
};
use cyroid_journal::{Connection, EventLogEntry, JournalStore, MemoryJournal};
use cyroid_msel::{Inject, Msel, MselStore};
use cyroid_topology::model::{Artifact, ArtifactPlacement, Network, Range, Snapshot, Vm, VmTemplate};
use cyroid_topology::TopologyStore;

use crate::repository::{ArtifactStore, PrincipalStore};

/// An in-memory reference [`Repository`](crate::repository::Repository)
/// implementation: one `BTreeMap` per entity kind, each behind its own
/// mutex so unrelated entities never contend with each other.
#[derive(Default)]
pub struct InMemoryRepository {
    ranges: Mutex<BTreeMap<RangeId, Range>>,
    networks: Mutex<BTreeMap<NetworkId, Network>>,
    vms: Mutex<BTreeMap<VmId, Vm>>,
    templates: Mutex<BTreeMap<TemplateId, VmTemplate>>,
    snapshots: Mutex<BTreeMap<SnapshotId, Snapshot>>,
    msels: Mutex<BTreeMap<MselId, Msel>>,
    artifacts: Mutex<BTreeMap<ArtifactId, Artifact>>,
    placements: Mutex<BTreeMap<uuid::Uuid, ArtifactPlacement>>,
    principals: Mutex<BTreeMap<PrincipalId, Principal>>,
    journal: MemoryJournal,
}

impl InMemoryRepository {
    /// Builds an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a template directly, bypassing the plan layer. Templates
    /// are seeded out of band (an operator action, not a range lifecycle
    /// step), so there is no `insert_template` on [`TopologyStore`].
    pub fn seed_template(&self, template: VmTemplate) {
        self.templates.lock().expect("template map poisoned").insert(template.id, template);
    }

    /// Captures every entity this reference store holds into a portable
    /// snapshot. Used only by the CLI's `--state-file` convenience (§11);
    /// the repository interface itself has no such operation, since a
    /// production implementation would back onto a real database instead.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            ranges: self.ranges.lock().expect("range map poisoned").values().cloned().collect(),
            networks: self.networks.lock().expect("network map poisoned").values().cloned().collect(),
            vms: self.vms.lock().expect("vm map poisoned").values().cloned().collect(),
            templates: self.templates.lock().expect("template map poisoned").values().cloned().collect(),
            snapshots: self.snapshots.lock().expect("snapshot map poisoned").values().cloned().collect(),
            msels: self.msels.lock().expect("msel map poisoned").values().cloned().collect(),
            artifacts: self.artifacts.lock().expect("artifact map poisoned").values().cloned().collect(),
            placements: self.placements.lock().expect("placement map poisoned").values().cloned().collect(),
            principals: self.principals.lock().expect("principal map poisoned").values().cloned().collect(),
        }
    }

    /// Rebuilds a repository from a previously captured [`SessionSnapshot`].
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let repo = Self::new();
        for range in snapshot.ranges {
            repo.ranges.lock().expect("range map poisoned").insert(range.id, range);
        }
        for network in snapshot.networks {
            repo.networks.lock().expect("network map poisoned").insert(network.id, network);
        }
        for vm in snapshot.vms {
            repo.vms.lock().expect("vm map poisoned").insert(vm.id, vm);
        }
        for template in snapshot.templates {
            repo.templates.lock().expect("template map poisoned").insert(template.id, template);
        }
        for snap in snapshot.snapshots {
            repo.snapshots.lock().expect("snapshot map poisoned").insert(snap.id, snap);
        }
        for msel in snapshot.msels {
            repo.msels.lock().expect("msel map poisoned").insert(msel.id, msel);
        }
        for artifact in snapshot.artifacts {
            repo.artifacts.lock().expect("artifact map poisoned").insert(artifact.id, artifact);
        }
        for placement in snapshot.placements {
            repo.placements.lock().expect("placement map poisoned").insert(placement.id, placement);
        }
        for principal in snapshot.principals {
            repo.principals.lock().expect("principal map poisoned").insert(principal.id, principal);
        }
        repo
    }
}

/// A serializable capture of every entity an [`InMemoryRepository`] holds,
/// used by the CLI to persist a session across separate invocations
/// (§11: the core's repository is an external collaborator, §1, so this
/// lives here purely as a test/CLI convenience, not a production format).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    /// Every known range.
    pub ranges: Vec<Range>,
    /// Every known network.
    pub networks: Vec<Network>,
    /// Every known VM.
    pub vms: Vec<Vm>,
    /// Every known template.
    pub templates: Vec<VmTemplate>,
    /// Every known snapshot.
    pub snapshots: Vec<Snapshot>,
    /// Every known MSEL.
    pub msels: Vec<Msel>,
    /// Every known artifact.
    pub artifacts: Vec<Artifact>,
    /// Every known artifact placement.
    pub placements: Vec<ArtifactPlacement>,
    /// Every known principal.
    pub principals: Vec<Principal>,
}

impl TopologyStore for InMemoryRepository {
    fn get_range(&self, id: RangeId) -> Result<Range> {
        self.ranges
            .lock()
            .expect("range map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("range", id.to_string()))
    }

    fn list_ranges(&self) -> Result<Vec<Range>> {
        Ok(self.ranges.lock().expect("range map poisoned").values().cloned().collect())
    }

    fn put_range(&self, range: &Range) -> Result<()> {
        self.ranges.lock().expect("range map poisoned").insert(range.id, range.clone());
        Ok(())
    }

    fn list_networks(&self, range_id: RangeId) -> Result<Vec<Network>> {
        Ok(self
            .networks
            .lock()
            .expect("network map poisoned")
            .values()
            .filter(|n| n.range_id == range_id)
            .cloned()
            .collect())
    }

    fn put_network(&self, network: &Network) -> Result<()> {
        self.networks.lock().expect("network map poisoned").insert(network.id, network.clone());
        Ok(())
    }

    fn list_vms(&self, range_id: RangeId) -> Result<Vec<Vm>> {
        Ok(self
            .vms
            .lock()
            .expect("vm map poisoned")
            .values()
            .filter(|v| v.range_id == range_id)
            .cloned()
            .collect())
    }

    fn get_vm(&self, id: VmId) -> Result<Vm> {
        self.vms
            .lock()
            .expect("vm map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("vm", id.to_string()))
    }

    fn put_vm(&self, vm: &Vm) -> Result<()> {
        self.vms.lock().expect("vm map poisoned").insert(vm.id, vm.clone());
        Ok(())
    }

    fn get_network(&self, id: NetworkId) -> Result<Network> {
        self.networks
            .lock()
            .expect("network map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("network", id.to_string()))
    }

    fn get_template(&self, id: TemplateId) -> Result<VmTemplate> {
        self.templates
            .lock()
            .expect("template map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("template", id.to_string()))
    }

    fn insert_range(&self, range: Range) -> Result<()> {
        self.ranges.lock().expect("range map poisoned").insert(range.id, range);
        Ok(())
    }

    fn insert_network(&self, network: Network) -> Result<()> {
        self.networks.lock().expect("network map poisoned").insert(network.id, network);
        Ok(())
    }

    fn insert_vm(&self, vm: Vm) -> Result<()> {
        self.vms.lock().expect("vm map poisoned").insert(vm.id, vm);
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots.lock().expect("snapshot map poisoned").insert(snapshot.id, snapshot);
        Ok(())
    }

    fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot> {
        self.snapshots
            .lock()
            .expect("snapshot map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("snapshot", id.to_string()))
    }

    fn find_template_by_name(&self, name: &str) -> Result<Option<TemplateId>> {
        Ok(self
            .templates
            .lock()
            .expect("template map poisoned")
            .values()
            .find(|t| t.name == name)
            .map(|t| t.id))
    }
}

impl MselStore for InMemoryRepository {
    fn get_msel_for_range(&self, range_id: RangeId) -> Result<Option<Msel>> {
        Ok(self
            .msels
            .lock()
            .expect("msel map poisoned")
            .values()
            .find(|m| m.range_id == range_id)
            .cloned())
    }

    fn put_msel(&self, msel: &Msel) -> Result<()> {
        self.msels.lock().expect("msel map poisoned").insert(msel.id, msel.clone());
        Ok(())
    }

    fn delete_msel(&self, msel_id: MselId) -> Result<()> {
        self.msels.lock().expect("msel map poisoned").remove(&msel_id);
        Ok(())
    }

    fn get_inject(&self, inject_id: InjectId) -> Result<Inject> {
        self.msels
            .lock()
            .expect("msel map poisoned")
            .values()
            .flat_map(|m| m.injects.iter())
            .find(|i| i.id == inject_id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("inject", inject_id.to_string()))
    }

    fn put_inject(&self, inject: &Inject) -> Result<()> {
        for msel in self.msels.lock().expect("msel map poisoned").values_mut() {
            if let Some(existing) = msel.injects.iter_mut().find(|i| i.id == inject.id) {
                *existing = inject.clone();
                return Ok(());
            }
        }
        Ok(())
    }
}

impl ArtifactStore for InMemoryRepository {
    fn get_artifact(&self, id: ArtifactId) -> Result<Artifact> {
        self.artifacts
            .lock()
            .expect("artifact map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("artifact", id.to_string()))
    }

    fn list_artifacts(&self, range_id: RangeId) -> Result<Vec<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .expect("artifact map poisoned")
            .values()
            .filter(|a| a.range_id == range_id)
            .cloned()
            .collect())
    }

    fn insert_artifact(&self, artifact: Artifact) -> Result<()> {
        self.artifacts.lock().expect("artifact map poisoned").insert(artifact.id, artifact);
        Ok(())
    }

    fn find_artifact_by_name(&self, range_id: RangeId, name: &str) -> Result<Option<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .expect("artifact map poisoned")
            .values()
            .find(|a| a.range_id == range_id && a.name == name)
            .cloned())
    }

    fn insert_placement(&self, placement: ArtifactPlacement) -> Result<()> {
        self.placements.lock().expect("placement map poisoned").insert(placement.id, placement);
        Ok(())
    }

    fn put_placement(&self, placement: &ArtifactPlacement) -> Result<()> {
        self.placements
            .lock()
            .expect("placement map poisoned")
            .insert(placement.id, placement.clone());
        Ok(())
    }

    fn list_placements(&self, vm_id: VmId) -> Result<Vec<ArtifactPlacement>> {
        Ok(self
            .placements
            .lock()
            .expect("placement map poisoned")
            .values()
            .filter(|p| p.vm_id == vm_id)
            .cloned()
            .collect())
    }
}

impl PrincipalStore for InMemoryRepository {
    fn get_principal(&self, id: PrincipalId) -> Result<Principal> {
        self.principals
            .lock()
            .expect("principal map poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| CyroidError::not_found("principal", id.to_string()))
    }

    fn put_principal(&self, principal: &Principal) -> Result<()> {
        self.principals
            .lock()
            .expect("principal map poisoned")
            .insert(principal.id, principal.clone());
        Ok(())
    }

    fn list_principals(&self) -> Result<Vec<Principal>> {
        Ok(self.principals.lock().expect("principal map poisoned").values().cloned().collect())
    }
}

impl JournalStore for InMemoryRepository {
    fn append_event(&self, entry: EventLogEntry) -> Result<()> {
        self.journal.append_event(entry)
    }

    fn query_events(
        &self,
        range_id: RangeId,
        kind: Option<EventKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventLogEntry>> {
        self.journal.query_events(range_id, kind, limit, offset)
    }

    fn record_connection(&self, connection: Connection) -> Result<()> {
        self.journal.record_connection(connection)
    }

    fn query_connections(&self, range_id: RangeId, limit: usize, offset: usize) -> Result<Vec<Connection>> {
        self.journal.query_connections(range_id, limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::status::RangeStatus;

    fn sample_range(owner_id: PrincipalId) -> Range {
        Range {
            id: RangeId::new(),
            name: "range-a".to_string(),
            description: None,
            owner_id,
            status: RangeStatus::Draft,
            tags: vec![],
        }
    }

    #[test]
    fn ranges_round_trip_through_insert_and_get() {
        let repo = InMemoryRepository::new();
        let range = sample_range(PrincipalId::new());
        repo.insert_range(range.clone()).unwrap();
        let fetched = repo.get_range(range.id).unwrap();
        assert_eq!(fetched.name, "range-a");
    }

    #[test]
    fn missing_range_is_not_found() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_range(RangeId::new()).is_err());
    }

    #[test]
    fn artifacts_are_found_by_exact_name_within_range() {
        let repo = InMemoryRepository::new();
        let range_id = RangeId::new();
        let artifact = Artifact {
            id: ArtifactId::new(),
            range_id,
            name: "a.exe".to_string(),
            blob_path: "/tmp/a.exe".to_string(),
            sha256: "deadbeef".to_string(),
            size: 4,
            kind: cyroid_common::status::ArtifactKind::Executable,
            indicator: cyroid_common::status::ArtifactIndicator::Safe,
            ttps: vec![],
            tags: vec![],
            uploader_id: PrincipalId::new(),
        };
        repo.insert_artifact(artifact).unwrap();
        assert!(repo.find_artifact_by_name(range_id, "a.exe").unwrap().is_some());
        assert!(repo.find_artifact_by_name(range_id, "b.exe").unwrap().is_none());
    }

    #[test]
    fn principal_standing_round_trips() {
        let repo = InMemoryRepository::new();
        let principal = Principal::new(PrincipalId::new()).with_standing(false, true, true);
        repo.put_principal(&principal).unwrap();
        let fetched = repo.get_principal(principal.id).unwrap();
        assert!(!fetched.approved);
        assert!(fetched.reset_required);
    }

    #[test]
    fn journal_writes_delegate_to_the_composed_memory_journal() {
        let repo = InMemoryRepository::new();
        let range_id = RangeId::new();
        repo.append_event(EventLogEntry::new(range_id, None, EventKind::RangeDeployed, "ok".to_string()))
            .unwrap();
        let events = repo.query_events(range_id, None, 10, 0).unwrap();
        assert_eq!(events.len(), 1);
    }
}
