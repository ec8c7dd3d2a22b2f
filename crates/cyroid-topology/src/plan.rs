//! Topology Orchestrator (C4): the range/VM/network state machines and
//! the deploy/teardown/start/stop/snapshot/clone/export/import plans that
//! compose them (§4.4).

use std::collections::HashMap;
use std::time::Duration;

use cyroid_common::config::CyroidConfig;
use cyroid_common::constants::CONTAINER_STOP_GRACE;
use cyroid_common::error::{CyroidError, Result};
use cyroid_common::event::{EventKind, EventRecorder};
use cyroid_common::ids::{NetworkId, RangeId, SnapshotId, TemplateId, VmId};
use cyroid_common::status::{NetworkStatus, RangeStatus, VmStatus, VmType};
use cyroid_runtime::{ContainerHandle, ContainerRuntime, ExecOptions, NetworkHandle};
use tracing::{info, warn};

use crate::blueprint::{BlueprintNetwork, BlueprintVm, RangeBlueprint};
use crate::lock::RangeLocks;
use crate::model::{Network, Snapshot, Vm};
use crate::store::TopologyStore;
use crate::synth;

/// Everything a plan needs beyond the entities it operates on: the engine
/// adapter, the storage port, the journal sink, per-range serialization,
/// and the ambient configuration (storage roots used by C5).
pub struct Orchestrator<'a> {
    /// Storage port for ranges/networks/VMs/templates/snapshots.
    pub store: &'a dyn TopologyStore,
    /// Container engine adapter.
    pub runtime: &'a dyn ContainerRuntime,
    /// Event journal sink.
    pub recorder: &'a dyn EventRecorder,
    /// Per-range lock table.
    pub locks: &'a RangeLocks,
    /// Ambient configuration (storage roots).
    pub config: &'a CyroidConfig,
}

fn network_runtime_name(network: &Network) -> String {
    format!("cyroid-{}-{}", network.name, synth::short_id(&network.range_id.to_string()))
}

impl Orchestrator<'_> {
    /// Runs the deploy plan for `range_id` (§4.4). Idempotent: entities
    /// that already have a runtime handle are started, not recreated.
    ///
    /// # Errors
    /// Returns the underlying error and marks the range `Error` (with a
    /// journal entry) if any step fails for a reason other than
    /// validation/authorization (§7's propagation rule).
    pub async fn deploy_range(&self, range_id: RangeId) -> Result<()> {
        let guard = self.locks.lock_for(range_id);
        let _held = guard.lock().await;

        let mut range = self.store.get_range(range_id)?;
        if !range.status.can_deploy() {
            return Err(CyroidError::validation(format!(
                "range cannot be deployed from status {:?}",
                range.status
            )));
        }
        range.status = RangeStatus::Deploying;
        self.store.put_range(&range)?;

        if let Err(e) = self.deploy_inner(range_id).await {
            self.mark_range_error(range_id, &e)?;
            return Err(e);
        }

        let mut range = self.store.get_range(range_id)?;
        range.status = RangeStatus::Running;
        self.store.put_range(&range)?;
        self.recorder.record(range_id, None, EventKind::RangeDeployed, "range deploy completed".to_string());
        Ok(())
    }

    async fn deploy_inner(&self, range_id: RangeId) -> Result<()> {
        for mut network in self.store.list_networks(range_id)? {
            if network.runtime_handle.is_none() {
                let mut labels = HashMap::new();
                labels.insert("cyroid.range_id".to_string(), range_id.to_string());
                labels.insert("cyroid.network_id".to_string(), network.id.to_string());
                let handle = self
                    .runtime
                    .create_network(
                        &network_runtime_name(&network),
                        &network.subnet,
                        &network.gateway,
                        network.isolation_level.is_internal(),
                        &labels,
                    )
                    .await?;
                network.runtime_handle = Some(handle.0);
                network.status = NetworkStatus::Provisioned;
                self.store.put_network(&network)?;
            }
        }

        for vm in self.store.list_vms(range_id)? {
            self.deploy_vm(&vm).await?;
        }

        Ok(())
    }

    async fn deploy_vm(&self, vm: &Vm) -> Result<()> {
        let mut vm = vm.clone();
        if let Some(handle) = vm.runtime_handle.clone() {
            self.runtime.start(&ContainerHandle(handle)).await?;
        } else {
            let network = self.store.get_network(vm.network_id)?;
            let template = self.store.get_template(vm.template_id)?;
            synth::seed_golden_image(&vm, &template, self.config)?;
            let spec = synth::synthesize(&vm, &template, &network, self.config)?;
            let handle = self.runtime.create_container(&spec).await?;
            vm.runtime_handle = Some(handle.0.clone());
            self.store.put_vm(&vm)?;
            self.runtime.start(&handle).await?;
            self.recorder.record(vm.range_id, Some(vm.id), EventKind::VmCreated, format!("container {} created", handle.0));

            if let Some(script) = &template.post_install_script {
                if template.vm_type == VmType::Container {
                    let result = self
                        .runtime
                        .exec(&handle, &["sh".to_string(), "-c".to_string(), script.clone()], &ExecOptions::default())
                        .await;
                    match result {
                        Ok(exec) if exec.exit_code != 0 => {
                            warn!(vm_id = %vm.id, exit_code = exec.exit_code, "post-install script exited non-zero");
                        }
                        Err(e) => warn!(vm_id = %vm.id, error = %e, "post-install script failed to run"),
                        Ok(_) => {}
                    }
                }
            }
        }

        vm.status = VmStatus::Running;
        self.store.put_vm(&vm)?;
        self.recorder.record(vm.range_id, Some(vm.id), EventKind::VmStarted, "vm started".to_string());
        Ok(())
    }

    fn mark_range_error(&self, range_id: RangeId, error: &CyroidError) -> Result<()> {
        if error.should_journal() {
            self.recorder.record(range_id, None, EventKind::VmError, error.to_string());
        }
        let mut range = self.store.get_range(range_id)?;
        range.status = RangeStatus::Error;
        self.store.put_range(&range)
    }

    /// Runs the teardown plan for `range_id` (§4.4). Forbidden while
    /// Deploying; otherwise idempotent regardless of current status.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if the range is Deploying.
    pub async fn teardown_range(&self, range_id: RangeId) -> Result<()> {
        let guard = self.locks.lock_for(range_id);
        let _held = guard.lock().await;

        let mut range = self.store.get_range(range_id)?;
        if !range.status.can_teardown() {
            return Err(CyroidError::validation("range cannot be torn down while deploying"));
        }

        for mut vm in self.store.list_vms(range_id)? {
            if let Some(handle) = vm.runtime_handle.take() {
                self.runtime.remove(&ContainerHandle(handle)).await?;
            }
            vm.status = VmStatus::Pending;
            self.store.put_vm(&vm)?;
        }

        for mut network in self.store.list_networks(range_id)? {
            if let Some(handle) = network.runtime_handle.take() {
                self.runtime.delete_network(&NetworkHandle(handle)).await?;
            }
            network.status = NetworkStatus::Unprovisioned;
            self.store.put_network(&network)?;
        }

        range.status = RangeStatus::Draft;
        self.store.put_range(&range)?;
        self.recorder.record(range_id, None, EventKind::RangeTeardown, "range torn down".to_string());
        Ok(())
    }

    /// Starts a single VM (§4.4's "single-VM start"), auto-transitioning
    /// the owning range to Running if it was Stopped or Draft.
    ///
    /// # Errors
    /// Propagates engine or storage errors.
    pub async fn start_vm(&self, vm_id: VmId) -> Result<()> {
        let vm = self.store.get_vm(vm_id)?;
        let guard = self.locks.lock_for(vm.range_id);
        let _held = guard.lock().await;

        self.deploy_vm(&vm).await?;

        let mut range = self.store.get_range(vm.range_id)?;
        if matches!(range.status, RangeStatus::Stopped | RangeStatus::Draft) {
            range.status = RangeStatus::Running;
            self.store.put_range(&range)?;
            self.recorder.record(vm.range_id, None, EventKind::RangeStarted, "range auto-started by vm start".to_string());
        }
        Ok(())
    }

    /// Stops a single VM, coalescing the owning range to Stopped if every
    /// sibling VM is now Stopped (§4.4, §8 scenario 6).
    ///
    /// # Errors
    /// Propagates engine or storage errors.
    pub async fn stop_vm(&self, vm_id: VmId) -> Result<()> {
        let mut vm = self.store.get_vm(vm_id)?;
        let guard = self.locks.lock_for(vm.range_id);
        let _held = guard.lock().await;

        if let Some(handle) = &vm.runtime_handle {
            self.runtime.stop(&ContainerHandle(handle.clone()), CONTAINER_STOP_GRACE).await?;
        }
        vm.status = VmStatus::Stopped;
        self.store.put_vm(&vm)?;
        self.recorder.record(vm.range_id, Some(vm.id), EventKind::VmStopped, "vm stopped".to_string());

        let siblings = self.store.list_vms(vm.range_id)?;
        if siblings.iter().all(|v| v.status == VmStatus::Stopped) {
            let mut range = self.store.get_range(vm.range_id)?;
            if range.status == RangeStatus::Running {
                range.status = RangeStatus::Stopped;
                self.store.put_range(&range)?;
                self.recorder.record(vm.range_id, None, EventKind::RangeStopped, "all vms stopped".to_string());
            }
        }
        Ok(())
    }

    /// Commits a running VM's container to a new image and records a
    /// [`Snapshot`] (§4.4).
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if the VM has no running
    /// container.
    pub async fn snapshot_create(&self, vm_id: VmId, name: &str, description: Option<String>) -> Result<SnapshotId> {
        let vm = self.store.get_vm(vm_id)?;
        let handle = vm
            .runtime_handle
            .clone()
            .ok_or_else(|| CyroidError::validation("vm has no running container to snapshot"))?;

        let repo_tag = format!("cyroid-snapshot-{}-{}", vm_id, name.to_lowercase().replace(' ', "-"));
        let image_id = self.runtime.commit(&ContainerHandle(handle), &repo_tag).await?;

        let snapshot = Snapshot {
            id: SnapshotId::new(),
            vm_id,
            name: name.to_string(),
            description,
            runtime_image_id: image_id,
        };
        self.store.insert_snapshot(snapshot.clone())?;
        self.recorder.record(vm.range_id, Some(vm_id), EventKind::SnapshotCreated, format!("snapshot {} created", snapshot.id));
        Ok(snapshot.id)
    }

    /// Stops and removes the source VM's current container (ignoring
    /// errors from that removal), then recreates it from the snapshot
    /// image with the same network attachment and resource caps (§4.4).
    ///
    /// # Errors
    /// Propagates errors from creating or starting the replacement
    /// container.
    pub async fn snapshot_restore(&self, snapshot_id: SnapshotId) -> Result<()> {
        let snapshot = self.store.get_snapshot(snapshot_id)?;
        let mut vm = self.store.get_vm(snapshot.vm_id)?;

        if let Some(handle) = vm.runtime_handle.take() {
            let handle = ContainerHandle(handle);
            let _ = self.runtime.stop(&handle, CONTAINER_STOP_GRACE).await;
            let _ = self.runtime.remove(&handle).await;
        }

        let network = self.store.get_network(vm.network_id)?;
        let mut spec = cyroid_runtime::ContainerSpec::new(
            format!("cyroid-{}-{}", vm.hostname, synth::short_id(&vm.id.to_string())),
            snapshot.runtime_image_id.clone(),
        );
        spec.hostname = vm.hostname.clone();
        spec.network_id = network.id.to_string();
        spec.ip_address = vm.ip_address.clone();
        spec.cpu_count = vm.cpu_count;
        spec.memory_mb = vm.ram_mb;
        spec.labels.insert("cyroid.range_id".to_string(), vm.range_id.to_string());
        spec.labels.insert("cyroid.vm_id".to_string(), vm.id.to_string());

        let handle = self.runtime.create_container(&spec).await?;
        self.runtime.start(&handle).await?;
        vm.runtime_handle = Some(handle.0);
        vm.status = VmStatus::Running;
        self.store.put_vm(&vm)?;
        self.recorder.record(vm.range_id, Some(vm.id), EventKind::SnapshotRestored, format!("restored from snapshot {snapshot_id}"));
        Ok(())
    }

    /// A pure-data copy of a range: new ids throughout, networks keep
    /// identical CIDRs (a warning is journaled, per the resolved subnet-reuse
    /// open question), VMs reference the same templates, handles and tags
    /// are not copied (§4.4, §9).
    ///
    /// # Errors
    /// Propagates storage errors.
    pub fn clone_range(&self, source_range_id: RangeId, new_name: &str) -> Result<RangeId> {
        let source = self.store.get_range(source_range_id)?;
        let new_range_id = RangeId::new();
        let cloned_range = crate::model::Range {
            id: new_range_id,
            name: new_name.to_string(),
            description: source.description.clone(),
            owner_id: source.owner_id,
            status: RangeStatus::Draft,
            tags: Vec::new(),
        };
        self.store.insert_range(cloned_range)?;

        let mut network_id_map: HashMap<NetworkId, NetworkId> = HashMap::new();
        let mut reused_subnets = Vec::new();
        for network in self.store.list_networks(source_range_id)? {
            let new_network_id = NetworkId::new();
            network_id_map.insert(network.id, new_network_id);
            reused_subnets.push(network.subnet.clone());
            self.store.insert_network(crate::model::Network {
                id: new_network_id,
                range_id: new_range_id,
                name: network.name.clone(),
                subnet: network.subnet.clone(),
                gateway: network.gateway.clone(),
                dns: network.dns.clone(),
                isolation_level: network.isolation_level,
                status: NetworkStatus::Unprovisioned,
                runtime_handle: None,
            })?;
        }

        for vm in self.store.list_vms(source_range_id)? {
            let Some(&new_network_id) = network_id_map.get(&vm.network_id) else {
                continue;
            };
            self.store.insert_vm(crate::model::Vm {
                id: VmId::new(),
                range_id: new_range_id,
                network_id: new_network_id,
                template_id: vm.template_id,
                hostname: vm.hostname.clone(),
                ip_address: vm.ip_address.clone(),
                cpu_count: vm.cpu_count,
                ram_mb: vm.ram_mb,
                disk_gb: vm.disk_gb,
                status: VmStatus::Pending,
                runtime_handle: None,
                extended: vm.extended.clone(),
            })?;
        }

        if !reused_subnets.is_empty() {
            warn!(range_id = %new_range_id, subnets = ?reused_subnets, "cloned range reuses source CIDRs; deploying both concurrently will collide");
            self.recorder.record(
                new_range_id,
                None,
                EventKind::RangeDeployed,
                format!("cloned from {source_range_id}, reusing subnets {reused_subnets:?}"),
            );
        }

        Ok(new_range_id)
    }

    /// Emits a declarative [`RangeBlueprint`] for `range_id` (§4.4, §6).
    ///
    /// # Errors
    /// Propagates storage errors, including a missing template lookup.
    pub fn export_blueprint(&self, range_id: RangeId) -> Result<RangeBlueprint> {
        let range = self.store.get_range(range_id)?;
        let mut blueprint = RangeBlueprint::new(range.name.clone(), range.description.clone());

        let mut network_names: HashMap<NetworkId, String> = HashMap::new();
        for network in self.store.list_networks(range_id)? {
            network_names.insert(network.id, network.name.clone());
            blueprint.networks.push(BlueprintNetwork {
                name: network.name,
                subnet: network.subnet,
                gateway: network.gateway,
                isolation_level: network.isolation_level,
            });
        }

        for vm in self.store.list_vms(range_id)? {
            let template = self.store.get_template(vm.template_id)?;
            let Some(network_name) = network_names.get(&vm.network_id) else {
                continue;
            };
            blueprint.vms.push(BlueprintVm {
                hostname: vm.hostname,
                ip_address: vm.ip_address,
                network_name: network_name.clone(),
                template_name: template.name,
                cpu: vm.cpu_count,
                ram_mb: vm.ram_mb,
                disk_gb: vm.disk_gb,
                position_x: vm.extended.position.0,
                position_y: vm.extended.position.1,
            });
        }

        Ok(blueprint)
    }

    /// Materializes a new Draft range from a [`RangeBlueprint`], owned by
    /// `owner_id`. VMs whose template name does not resolve are skipped
    /// and logged rather than aborting the whole import (§4.4).
    ///
    /// # Errors
    /// Propagates storage errors other than a missing template (which is
    /// a per-VM skip, not a failure).
    pub fn import_blueprint(&self, owner_id: cyroid_common::ids::PrincipalId, blueprint: &RangeBlueprint) -> Result<RangeId> {
        let range_id = RangeId::new();
        self.store.insert_range(crate::model::Range {
            id: range_id,
            name: blueprint.name.clone(),
            description: blueprint.description.clone(),
            owner_id,
            status: RangeStatus::Draft,
            tags: Vec::new(),
        })?;

        let mut network_ids: HashMap<String, NetworkId> = HashMap::new();
        for network in &blueprint.networks {
            let network_id = NetworkId::new();
            network_ids.insert(network.name.clone(), network_id);
            self.store.insert_network(crate::model::Network {
                id: network_id,
                range_id,
                name: network.name.clone(),
                subnet: network.subnet.clone(),
                gateway: network.gateway.clone(),
                dns: Vec::new(),
                isolation_level: network.isolation_level,
                status: NetworkStatus::Unprovisioned,
                runtime_handle: None,
            })?;
        }

        for vm in &blueprint.vms {
            let Some(template_id) = self.store.find_template_by_name(&vm.template_name)? else {
                warn!(range_id = %range_id, template = %vm.template_name, "import: template not found, skipping vm");
                self.recorder.record(range_id, None, EventKind::VmError, format!("skipped vm {} - template {} not found", vm.hostname, vm.template_name));
                continue;
            };
            let Some(&network_id) = network_ids.get(&vm.network_name) else {
                warn!(range_id = %range_id, network = %vm.network_name, "import: network not found, skipping vm");
                continue;
            };
            self.store.insert_vm(crate::model::Vm {
                id: VmId::new(),
                range_id,
                network_id,
                template_id,
                hostname: vm.hostname.clone(),
                ip_address: vm.ip_address.clone(),
                cpu_count: vm.cpu,
                ram_mb: vm.ram_mb,
                disk_gb: vm.disk_gb,
                status: VmStatus::Pending,
                runtime_handle: None,
                extended: crate::model::VmExtendedConfig {
                    position: (vm.position_x, vm.position_y),
                    ..Default::default()
                },
            })?;
        }

        info!(range_id = %range_id, "range imported from blueprint");
        Ok(range_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Network, Range, Vm, VmExtendedConfig, VmTemplate};
    use cyroid_common::ids::PrincipalId;
    use cyroid_common::status::{IsolationLevel, OsKind};
    use std::sync::Mutex as StdMutex;

    struct MemoryStore {
        ranges: StdMutex<HashMap<RangeId, Range>>,
        networks: StdMutex<HashMap<NetworkId, Network>>,
        vms: StdMutex<HashMap<VmId, Vm>>,
        templates: StdMutex<HashMap<TemplateId, VmTemplate>>,
        snapshots: StdMutex<HashMap<SnapshotId, Snapshot>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                ranges: StdMutex::new(HashMap::new()),
                networks: StdMutex::new(HashMap::new()),
                vms: StdMutex::new(HashMap::new()),
                templates: StdMutex::new(HashMap::new()),
                snapshots: StdMutex::new(HashMap::new()),
            }
        }
    }

    impl TopologyStore for MemoryStore {
        fn get_range(&self, id: RangeId) -> Result<Range> {
            self.ranges.lock().unwrap().get(&id).cloned().ok_or_else(|| CyroidError::not_found("range", id.to_string()))
        }
        fn list_ranges(&self) -> Result<Vec<Range>> {
            Ok(self.ranges.lock().unwrap().values().cloned().collect())
        }
        fn put_range(&self, range: &Range) -> Result<()> {
            self.ranges.lock().unwrap().insert(range.id, range.clone());
            Ok(())
        }
        fn list_networks(&self, range_id: RangeId) -> Result<Vec<Network>> {
            Ok(self.networks.lock().unwrap().values().filter(|n| n.range_id == range_id).cloned().collect())
        }
        fn put_network(&self, network: &Network) -> Result<()> {
            self.networks.lock().unwrap().insert(network.id, network.clone());
            Ok(())
        }
        fn list_vms(&self, range_id: RangeId) -> Result<Vec<Vm>> {
            Ok(self.vms.lock().unwrap().values().filter(|v| v.range_id == range_id).cloned().collect())
        }
        fn get_vm(&self, id: VmId) -> Result<Vm> {
            self.vms.lock().unwrap().get(&id).cloned().ok_or_else(|| CyroidError::not_found("vm", id.to_string()))
        }
        fn put_vm(&self, vm: &Vm) -> Result<()> {
            self.vms.lock().unwrap().insert(vm.id, vm.clone());
            Ok(())
        }
        fn get_network(&self, id: NetworkId) -> Result<Network> {
            self.networks.lock().unwrap().get(&id).cloned().ok_or_else(|| CyroidError::not_found("network", id.to_string()))
        }
        fn get_template(&self, id: TemplateId) -> Result<VmTemplate> {
            self.templates.lock().unwrap().get(&id).cloned().ok_or_else(|| CyroidError::not_found("template", id.to_string()))
        }
        fn insert_range(&self, range: Range) -> Result<()> {
            self.ranges.lock().unwrap().insert(range.id, range);
            Ok(())
        }
        fn insert_network(&self, network: Network) -> Result<()> {
            self.networks.lock().unwrap().insert(network.id, network);
            Ok(())
        }
        fn insert_vm(&self, vm: Vm) -> Result<()> {
            self.vms.lock().unwrap().insert(vm.id, vm);
            Ok(())
        }
        fn insert_snapshot(&self, snapshot: Snapshot) -> Result<()> {
            self.snapshots.lock().unwrap().insert(snapshot.id, snapshot);
            Ok(())
        }
        fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot> {
            self.snapshots.lock().unwrap().get(&id).cloned().ok_or_else(|| CyroidError::not_found("snapshot", id.to_string()))
        }
        fn find_template_by_name(&self, name: &str) -> Result<Option<TemplateId>> {
            Ok(self.templates.lock().unwrap().values().find(|t| t.name == name).map(|t| t.id))
        }
    }

    struct NoopRuntime;

    #[async_trait::async_trait]
    impl ContainerRuntime for NoopRuntime {
        async fn create_network(
            &self,
            _name: &str,
            _subnet: &str,
            _gateway: &str,
            _internal: bool,
            _labels: &HashMap<String, String>,
        ) -> cyroid_runtime::backend::Result<NetworkHandle> {
            Ok(NetworkHandle("net-1".to_string()))
        }
        async fn delete_network(&self, _handle: &NetworkHandle) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn create_container(&self, spec: &cyroid_runtime::ContainerSpec) -> cyroid_runtime::backend::Result<ContainerHandle> {
            Ok(ContainerHandle(format!("container-{}", spec.name)))
        }
        async fn start(&self, _handle: &ContainerHandle) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn stop(&self, _handle: &ContainerHandle, _grace: Duration) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn restart(&self, _handle: &ContainerHandle, _grace: Duration) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn remove(&self, _handle: &ContainerHandle) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn exec(
            &self,
            _handle: &ContainerHandle,
            _argv: &[String],
            _opts: &ExecOptions,
        ) -> cyroid_runtime::backend::Result<cyroid_runtime::ExecResult> {
            Ok(cyroid_runtime::ExecResult { exit_code: 0, output: String::new() })
        }
        async fn exec_interactive(
            &self,
            _handle: &ContainerHandle,
            _argv: &[String],
        ) -> cyroid_runtime::backend::Result<Box<dyn cyroid_runtime::backend::InteractiveExec>> {
            unimplemented!("not exercised by these tests")
        }
        async fn copy_to(&self, _handle: &ContainerHandle, _source: &cyroid_runtime::spec::CopySource) -> cyroid_runtime::backend::Result<()> {
            Ok(())
        }
        async fn commit(&self, _handle: &ContainerHandle, repo_tag: &str) -> cyroid_runtime::backend::Result<String> {
            Ok(format!("image-{repo_tag}"))
        }
        async fn pull_stream(
            &self,
            _image: &str,
        ) -> cyroid_runtime::backend::Result<futures_util::stream::BoxStream<'static, cyroid_runtime::spec::PullProgress>> {
            use futures_util::StreamExt;
            Ok(futures_util::stream::once(async { cyroid_runtime::spec::PullProgress::Complete }).boxed())
        }
        async fn stats(&self, _handle: &ContainerHandle) -> cyroid_runtime::backend::Result<Option<cyroid_runtime::spec::Stats>> {
            Ok(None)
        }
        async fn container_ip(&self, _handle: &ContainerHandle) -> cyroid_runtime::backend::Result<Option<String>> {
            Ok(None)
        }
        async fn list_containers(&self, _label_filter: &HashMap<String, String>) -> cyroid_runtime::backend::Result<Vec<ContainerHandle>> {
            Ok(Vec::new())
        }
        async fn list_networks(&self, _label_filter: &HashMap<String, String>) -> cyroid_runtime::backend::Result<Vec<NetworkHandle>> {
            Ok(Vec::new())
        }
    }

    struct VecRecorder(StdMutex<Vec<(EventKind, String)>>);

    impl EventRecorder for VecRecorder {
        fn record(&self, _range_id: RangeId, _vm_id: Option<VmId>, kind: EventKind, message: String) {
            self.0.lock().unwrap().push((kind, message));
        }
    }

    fn seed_two_vm_range(store: &MemoryStore) -> RangeId {
        let owner = PrincipalId::new();
        let range_id = RangeId::new();
        store
            .insert_range(Range { id: range_id, name: "demo".to_string(), description: None, owner_id: owner, status: RangeStatus::Draft, tags: vec![] })
            .unwrap();

        let dmz_id = NetworkId::new();
        store
            .insert_network(Network {
                id: dmz_id,
                range_id,
                name: "dmz".to_string(),
                subnet: "10.0.1.0/24".to_string(),
                gateway: "10.0.1.1".to_string(),
                dns: vec![],
                isolation_level: IsolationLevel::Complete,
                status: NetworkStatus::Unprovisioned,
                runtime_handle: None,
            })
            .unwrap();

        let template_id = TemplateId::new();
        store
            .templates
            .lock()
            .unwrap()
            .insert(
                template_id,
                VmTemplate {
                    id: template_id,
                    name: "nginx-base".to_string(),
                    os_kind: OsKind::Linux,
                    linux_distro: None,
                    base_image: "nginx:alpine".to_string(),
                    vm_type: VmType::Container,
                    default_cpu: 1,
                    default_ram_mb: 512,
                    default_disk_gb: 10,
                    post_install_script: None,
                    golden_image_path: None,
                    cached_iso_path: None,
                    tags: vec![],
                    owner_id: owner,
                },
            );

        for hostname in ["web", "db"] {
            store
                .insert_vm(Vm {
                    id: VmId::new(),
                    range_id,
                    network_id: dmz_id,
                    template_id,
                    hostname: hostname.to_string(),
                    ip_address: "10.0.1.10".to_string(),
                    cpu_count: 1,
                    ram_mb: 512,
                    disk_gb: 10,
                    status: VmStatus::Pending,
                    runtime_handle: None,
                    extended: VmExtendedConfig::default(),
                })
                .unwrap();
        }
        range_id
    }

    #[tokio::test]
    async fn deploy_range_provisions_networks_and_starts_vms() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        orchestrator.deploy_range(range_id).await.unwrap();

        let range = store.get_range(range_id).unwrap();
        assert_eq!(range.status, RangeStatus::Running);
        for vm in store.list_vms(range_id).unwrap() {
            assert_eq!(vm.status, VmStatus::Running);
            assert!(vm.runtime_handle.is_some());
        }
        for network in store.list_networks(range_id).unwrap() {
            assert!(network.runtime_handle.is_some());
        }
    }

    #[tokio::test]
    async fn deploy_on_running_range_is_rejected() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        orchestrator.deploy_range(range_id).await.unwrap();
        let second = orchestrator.deploy_range(range_id).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn teardown_clears_handles_and_returns_to_draft() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        orchestrator.deploy_range(range_id).await.unwrap();
        orchestrator.teardown_range(range_id).await.unwrap();

        let range = store.get_range(range_id).unwrap();
        assert_eq!(range.status, RangeStatus::Draft);
        for vm in store.list_vms(range_id).unwrap() {
            assert_eq!(vm.status, VmStatus::Pending);
            assert!(vm.runtime_handle.is_none());
        }
    }

    #[tokio::test]
    async fn stopping_last_running_vm_coalesces_range_to_stopped() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        orchestrator.deploy_range(range_id).await.unwrap();
        let vms = store.list_vms(range_id).unwrap();

        orchestrator.stop_vm(vms[0].id).await.unwrap();
        assert_eq!(store.get_range(range_id).unwrap().status, RangeStatus::Running);

        orchestrator.stop_vm(vms[1].id).await.unwrap();
        assert_eq!(store.get_range(range_id).unwrap().status, RangeStatus::Stopped);
    }

    #[test]
    fn clone_range_copies_networks_and_vms_with_new_ids() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        let clone_id = orchestrator.clone_range(range_id, "demo-clone").unwrap();
        assert_ne!(clone_id, range_id);
        assert_eq!(store.list_networks(clone_id).unwrap().len(), 1);
        assert_eq!(store.list_vms(clone_id).unwrap().len(), 2);
        for vm in store.list_vms(clone_id).unwrap() {
            assert!(vm.runtime_handle.is_none());
        }
    }

    #[test]
    fn export_then_import_reconstructs_topology_shape() {
        let store = MemoryStore::new();
        let range_id = seed_two_vm_range(&store);
        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        let blueprint = orchestrator.export_blueprint(range_id).unwrap();
        assert_eq!(blueprint.networks.len(), 1);
        assert_eq!(blueprint.vms.len(), 2);

        let owner = PrincipalId::new();
        let imported_id = orchestrator.import_blueprint(owner, &blueprint).unwrap();
        assert_eq!(store.list_networks(imported_id).unwrap().len(), 1);
        assert_eq!(store.list_vms(imported_id).unwrap().len(), 2);
    }

    #[test]
    fn import_skips_vm_with_missing_template() {
        let store = MemoryStore::new();
        let mut blueprint = RangeBlueprint::new("partial", None);
        blueprint.networks.push(BlueprintNetwork {
            name: "dmz".to_string(),
            subnet: "10.0.1.0/24".to_string(),
            gateway: "10.0.1.1".to_string(),
            isolation_level: IsolationLevel::Complete,
        });
        blueprint.vms.push(BlueprintVm {
            hostname: "ghost".to_string(),
            ip_address: "10.0.1.20".to_string(),
            network_name: "dmz".to_string(),
            template_name: "does-not-exist".to_string(),
            cpu: 1,
            ram_mb: 512,
            disk_gb: 10,
            position_x: 0,
            position_y: 0,
        });

        let runtime = NoopRuntime;
        let recorder = VecRecorder(StdMutex::new(Vec::new()));
        let locks = RangeLocks::new();
        let config = CyroidConfig::default();
        let orchestrator = Orchestrator { store: &store, runtime: &runtime, recorder: &recorder, locks: &locks, config: &config };

        let imported_id = orchestrator.import_blueprint(PrincipalId::new(), &blueprint).unwrap();
        assert_eq!(store.list_vms(imported_id).unwrap().len(), 0);
        assert_eq!(store.list_networks(imported_id).unwrap().len(), 1);
    }
}
