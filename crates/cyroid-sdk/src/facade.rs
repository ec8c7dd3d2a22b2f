//! The `Cyroid` facade: wires the Authorization Filter (C3), Topology
//! Orchestrator (C4), VM Image Synthesizer (C5), MSEL Engine (C6),
//! Session Multiplexer (C7), Journal (C8), and Cache Manager (C2) over
//! one [`Repository`] and one [`ContainerRuntime`] for a consumer like
//! the CLI to drive (§4, §9: "a facade type wiring C1..C8 together").

use std::path::Path;
use std::sync::Arc;

use cyroid_auth::Principal;
use cyroid_cache::CacheManager;
use cyroid_common::config::CyroidConfig;
use cyroid_common::error::{CyroidError, Result};
use cyroid_common::ids::{
    ArtifactId, InjectId, MselId, PrincipalId, RangeId, SnapshotId, VmId,
};
use cyroid_common::status::{ArtifactIndicator, ArtifactKind};
use cyroid_journal::{Connection, ConnectionSample, EventLogEntry, JournalRecorder, JournalStore};
use cyroid_msel::MselStore;
use cyroid_runtime::{BollardRuntime, ContainerHandle, ContainerRuntime};
use cyroid_session::{RangeStatusSource, VncUpstream, WsConnection};
use cyroid_topology::blueprint::RangeBlueprint;
use cyroid_topology::model::{Artifact, ArtifactPlacement, Range};
use cyroid_topology::{Orchestrator, RangeLocks, TopologyStore};

use crate::adapters::{RepoArtifactSource, RepoStatusSource, RepoVmDirectory, RepoVmIpResolver};
use crate::memory::InMemoryRepository;
use crate::repository::{ArtifactStore, PrincipalStore, Repository};

fn sha256_and_size(path: &Path) -> Result<(String, u64)> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(|e| CyroidError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buffer).map_err(|e| CyroidError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buffer[..n]);
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

/// The top-level entry point consumers (the CLI, or any other host
/// process) drive every operation through.
///
/// Cheap to clone: every field is an `Arc` or already internally
/// reference-counted, matching C2's "initialize once, pass as an
/// explicit parameter" guidance for process-wide collaborators.
#[derive(Clone)]
pub struct Cyroid {
    /// The storage port every domain crate's plans and filters read
    /// and write through.
    pub repo: Arc<dyn Repository>,
    /// The container engine adapter (C1).
    pub runtime: Arc<dyn ContainerRuntime>,
    /// The cache manager (C2), exposed directly since its own public
    /// methods already are the CLI-facing contract.
    pub cache: CacheManager,
    /// Ambient configuration (storage roots, §6).
    pub config: Arc<CyroidConfig>,
    locks: Arc<RangeLocks>,
}

impl Cyroid {
    /// Builds a facade over an explicit repository and runtime.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, runtime: Arc<dyn ContainerRuntime>, config: CyroidConfig) -> Self {
        let config = Arc::new(config);
        let cache = CacheManager::new((*config).clone(), Arc::clone(&runtime));
        Self {
            repo,
            runtime,
            cache,
            config,
            locks: Arc::new(RangeLocks::new()),
        }
    }

    /// Convenience constructor: dials the local container engine (C1)
    /// and starts from a fresh [`InMemoryRepository`] (C9).
    ///
    /// # Errors
    /// Returns an error if the engine adapter fails to connect.
    pub fn connect(config: CyroidConfig) -> Result<Self> {
        let runtime: Arc<dyn ContainerRuntime> =
            Arc::new(BollardRuntime::connect().map_err(CyroidError::from)?);
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        Ok(Self::new(repo, runtime, config))
    }

    // ---- Topology Orchestrator (C4) ----

    /// Runs the deploy plan for `range_id`.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn deploy_range(&self, range_id: RangeId) -> Result<()> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.deploy_range(range_id).await
    }

    /// Runs the teardown plan for `range_id`.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn teardown_range(&self, range_id: RangeId) -> Result<()> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.teardown_range(range_id).await
    }

    /// Starts a single VM.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn start_vm(&self, vm_id: VmId) -> Result<()> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.start_vm(vm_id).await
    }

    /// Stops a single VM.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn stop_vm(&self, vm_id: VmId) -> Result<()> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.stop_vm(vm_id).await
    }

    /// Commits `vm_id`'s container filesystem into a named snapshot.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn snapshot_create(
        &self,
        vm_id: VmId,
        name: &str,
        description: Option<String>,
    ) -> Result<SnapshotId> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.snapshot_create(vm_id, name, description).await
    }

    /// Recreates a VM's container from a previously captured snapshot.
    ///
    /// # Errors
    /// Propagates any plan-step failure.
    pub async fn snapshot_restore(&self, snapshot_id: SnapshotId) -> Result<()> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.snapshot_restore(snapshot_id).await
    }

    /// Clones `source_range_id`'s topology into a new, undeployed range
    /// named `new_name`.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn clone_range(&self, source_range_id: RangeId, new_name: &str) -> Result<RangeId> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.clone_range(source_range_id, new_name)
    }

    /// Exports `range_id`'s topology as a portable blueprint.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn export_blueprint(&self, range_id: RangeId) -> Result<RangeBlueprint> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.export_blueprint(range_id)
    }

    /// Imports `blueprint` as a new range owned by `owner_id`.
    ///
    /// # Errors
    /// Propagates any storage failure, including an unresolvable
    /// template name.
    pub fn import_blueprint(&self, owner_id: PrincipalId, blueprint: &RangeBlueprint) -> Result<RangeId> {
        let store: &dyn TopologyStore = self.repo.as_ref();
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        let recorder = JournalRecorder::new(journal_store);
        let orchestrator = Orchestrator {
            store,
            runtime: self.runtime.as_ref(),
            recorder: &recorder,
            locks: &self.locks,
            config: self.config.as_ref(),
        };
        orchestrator.import_blueprint(owner_id, blueprint)
    }

    // ---- Authorization Filter (C3) ----

    /// Lists every range visible to `principal` (§4.3).
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn list_visible_ranges(&self, principal: &Principal) -> Result<Vec<Range>> {
        let ranges = self.repo.list_ranges()?;
        Ok(cyroid_auth::filter_visible(principal, ranges.iter()).into_iter().cloned().collect())
    }

    /// Fetches `range_id`, failing with [`CyroidError::Forbidden`] if
    /// `principal` cannot see it.
    ///
    /// # Errors
    /// Propagates a storage not-found, or a forbidden error if the
    /// range exists but is not visible to `principal`.
    pub fn get_range_for(&self, principal: &Principal, range_id: RangeId) -> Result<Range> {
        let range = self.repo.get_range(range_id)?;
        cyroid_auth::check_access(principal, &range)?;
        Ok(range)
    }

    // ---- MSEL Engine (C6) ----

    /// Parses `text` and imports it as `range_id`'s MSEL, replacing any
    /// prior one.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn import_msel(&self, range_id: RangeId, name: &str, text: &str) -> Result<MselId> {
        let msel = cyroid_msel::parse(range_id, name, text);
        let msel_store: &dyn MselStore = self.repo.as_ref();
        cyroid_msel::import_msel(msel_store, range_id, msel)
    }

    /// Executes `inject_id`'s actions against `range_id`'s VMs,
    /// journaling the outcome.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if the inject is not
    /// currently executable; otherwise propagates storage or runtime
    /// failures.
    pub async fn run_inject(&self, range_id: RangeId, inject_id: InjectId) -> Result<()> {
        let msel_store: &dyn MselStore = self.repo.as_ref();
        let mut inject = msel_store.get_inject(inject_id)?;

        let vms = RepoVmDirectory::new(self.repo.as_ref());
        let artifacts = RepoArtifactSource::new(self.repo.as_ref());
        let outcome = cyroid_msel::execute_inject(
            self.runtime.as_ref(),
            &vms,
            &artifacts,
            range_id,
            &mut inject,
        )
        .await;

        msel_store.put_inject(&inject)?;

        let kind = if matches!(inject.status, cyroid_common::status::InjectStatus::Completed) {
            cyroid_common::event::EventKind::InjectExecuted
        } else {
            cyroid_common::event::EventKind::InjectFailed
        };
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        journal_store.append_event(EventLogEntry::new(
            range_id,
            None,
            kind,
            format!("inject {inject_id} finished"),
        ))?;

        outcome
    }

    /// Marks `inject_id` skipped without running its actions, recording
    /// an optional operator-supplied reason in its execution log.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if the inject has already
    /// run or been skipped.
    pub fn skip_inject(&self, inject_id: InjectId, reason: Option<String>) -> Result<()> {
        let msel_store: &dyn MselStore = self.repo.as_ref();
        let mut inject = msel_store.get_inject(inject_id)?;
        cyroid_msel::skip_inject(&mut inject)?;
        if let Some(reason) = reason {
            inject.execution_log = Some(format!("skipped: {reason}"));
        }
        msel_store.put_inject(&inject)
    }

    // ---- Artifacts (§3) ----

    /// Registers a local file as a new artifact available to `place_file`
    /// actions within `range_id`, hashing it and recording its size.
    ///
    /// # Errors
    /// Returns [`CyroidError::Io`] if `local_path` cannot be read.
    #[allow(clippy::too_many_arguments)]
    pub fn register_artifact(
        &self,
        range_id: RangeId,
        uploader_id: PrincipalId,
        local_path: &Path,
        name: &str,
        kind: ArtifactKind,
        indicator: ArtifactIndicator,
        ttps: Vec<String>,
        tags: Vec<String>,
    ) -> Result<ArtifactId> {
        let (sha256, size) = sha256_and_size(local_path)?;
        let artifact = Artifact {
            id: ArtifactId::new(),
            range_id,
            name: name.to_string(),
            blob_path: local_path.to_string_lossy().into_owned(),
            sha256,
            size,
            kind,
            indicator,
            ttps,
            tags,
            uploader_id,
        };
        let id = artifact.id;
        let artifact_store: &dyn ArtifactStore = self.repo.as_ref();
        artifact_store.insert_artifact(artifact)?;
        Ok(id)
    }

    /// Lists every artifact uploaded into `range_id`.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn list_artifacts(&self, range_id: RangeId) -> Result<Vec<Artifact>> {
        let artifact_store: &dyn ArtifactStore = self.repo.as_ref();
        artifact_store.list_artifacts(range_id)
    }

    /// Records that `artifact_id` was (or is being) placed onto `vm_id`
    /// at `target_path`.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn record_placement(
        &self,
        artifact_id: ArtifactId,
        vm_id: VmId,
        target_path: &str,
    ) -> Result<()> {
        let placement = ArtifactPlacement {
            id: uuid::Uuid::new_v4(),
            artifact_id,
            vm_id,
            target_path: target_path.to_string(),
            status: cyroid_common::status::PlacementStatus::Pending,
            error: None,
        };
        let artifact_store: &dyn ArtifactStore = self.repo.as_ref();
        artifact_store.insert_placement(placement)
    }

    // ---- Journal (C8) ----

    /// Queries `range_id`'s event log, optionally filtered by kind.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn list_events(
        &self,
        range_id: RangeId,
        kind: Option<cyroid_common::event::EventKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventLogEntry>> {
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        journal_store.query_events(range_id, kind, limit, offset)
    }

    /// Resolves `sample`'s VM ids and records the resulting connection.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn record_connection_sample(&self, sample: ConnectionSample) -> Result<()> {
        let resolver = RepoVmIpResolver::new(self.repo.as_ref());
        let connection = cyroid_journal::resolve_connection(&resolver, sample)?;
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        journal_store.record_connection(connection)
    }

    /// Queries `range_id`'s tracked connections.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn list_connections(&self, range_id: RangeId, limit: usize, offset: usize) -> Result<Vec<Connection>> {
        let journal_store: &dyn JournalStore = self.repo.as_ref();
        journal_store.query_connections(range_id, limit, offset)
    }

    // ---- Principals (§3) ----

    /// Fetches a principal's durable record.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn get_principal(&self, id: PrincipalId) -> Result<Principal> {
        let principal_store: &dyn PrincipalStore = self.repo.as_ref();
        principal_store.get_principal(id)
    }

    /// Persists a principal's full state: role, tags, and account
    /// standing (§3's `approved`/`active`/`reset_required`).
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn put_principal(&self, principal: &Principal) -> Result<()> {
        let principal_store: &dyn PrincipalStore = self.repo.as_ref();
        principal_store.put_principal(principal)
    }

    /// Lists every known principal.
    ///
    /// # Errors
    /// Propagates any storage failure.
    pub fn list_principals(&self) -> Result<Vec<Principal>> {
        let principal_store: &dyn PrincipalStore = self.repo.as_ref();
        principal_store.list_principals()
    }

    /// Runs `argv` to completion inside `vm_id`'s container and returns
    /// the exit code plus combined output, for non-interactive callers
    /// (the CLI's `vm exec`) that do not need a PTY bridge.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if `vm_id` has no running
    /// container; otherwise propagates the runtime's exec failure.
    pub async fn exec_in_vm(
        &self,
        vm_id: VmId,
        argv: &[String],
    ) -> Result<cyroid_runtime::ExecResult> {
        let vm = self.repo.get_vm(vm_id)?;
        let handle = vm
            .runtime_handle
            .clone()
            .map(ContainerHandle)
            .ok_or_else(|| CyroidError::validation(format!("vm {vm_id} has no running container")))?;
        self.runtime
            .exec(&handle, argv, &cyroid_runtime::ExecOptions::default())
            .await
            .map_err(CyroidError::from)
    }

    // ---- Session Multiplexer (C7) ----

    /// Runs a shell console session over `client`, attached to `vm_id`'s
    /// running container, until either side disconnects.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if `vm_id` has no running
    /// container; otherwise propagates the runtime's exec failure.
    pub async fn run_console_session(&self, client: Box<dyn WsConnection>, vm_id: VmId) -> Result<()> {
        let vm = self.repo.get_vm(vm_id)?;
        let handle = vm
            .runtime_handle
            .clone()
            .map(ContainerHandle)
            .ok_or_else(|| CyroidError::validation(format!("vm {vm_id} has no running container")))?;
        let argv: Vec<String> =
            cyroid_session::CONSOLE_SHELL_COMMAND.iter().map(|s| (*s).to_string()).collect();
        let exec = self.runtime.exec_interactive(&handle, &argv).await.map_err(CyroidError::from)?;
        cyroid_session::run_console(client, exec).await;
        Ok(())
    }

    /// Runs the range-status poller over `client` until disconnection
    /// or a source error.
    pub async fn run_status_session(&self, client: Box<dyn WsConnection>, range_id: RangeId) {
        let source = RepoStatusSource::new(self.repo.as_ref());
        let source: &dyn RangeStatusSource = &source;
        cyroid_session::run_status_poller(client, source, range_id).await;
    }

    /// Resolves the `ws://` upstream URL the VNC proxy should dial for
    /// `vm_id`, or `Ok(None)` for a headless VM.
    ///
    /// # Errors
    /// Returns an error if the VM's container has no resolvable IP.
    pub async fn vnc_upstream_url(&self, vm_id: VmId) -> Result<Option<String>> {
        let vm = self.repo.get_vm(vm_id)?;
        let template = self.repo.get_template(vm.template_id)?;
        let Some(port) = cyroid_topology::vnc_backend_port(&vm, &template) else {
            return Ok(None);
        };
        let handle = vm
            .runtime_handle
            .clone()
            .map(ContainerHandle)
            .ok_or_else(|| CyroidError::validation(format!("vm {vm_id} has no running container")))?;
        let ip = cyroid_session::resolve_vm_ip(self.runtime.as_ref(), &handle, vm_id).await?;
        Ok(Some(cyroid_session::upstream_url(&ip, port)))
    }

    /// Runs the VNC proxy pump between `client` and `upstream` until
    /// either side closes.
    pub async fn run_vnc_session(&self, client: Box<dyn WsConnection>, upstream: Box<dyn VncUpstream>) {
        cyroid_session::run_vnc_proxy(client, upstream).await;
    }
}
