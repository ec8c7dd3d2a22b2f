//! Inject dispatch (§4.6's "Execution contract"): per-action dispatch to
//! the container runtime adapter (C1) for `run_command`, or to the
//! artifact store for `place_file`, with per-action error isolation.

use std::path::PathBuf;

use chrono::Utc;
use cyroid_common::error::{CyroidError, Result};
use cyroid_common::ids::{RangeId, VmId};
use cyroid_common::status::InjectStatus;
use cyroid_runtime::backend::ContainerHandle;
use cyroid_runtime::spec::{CopySource, ExecOptions};
use cyroid_runtime::ContainerRuntime;

use crate::ast::{Action, Inject};

/// A VM resolved by hostname within a range, as seen by the MSEL engine.
///
/// Kept deliberately narrow (no dependency on `cyroid-topology`, per
/// `DESIGN.md`'s leaf-crate layering) — a facade composes this from the
/// topology store.
pub struct VmTarget {
    /// Id of the resolved VM, used only for error messages.
    pub vm_id: VmId,
    /// Whether the VM currently has a running container.
    pub running: bool,
    /// Engine container handle, present regardless of `running` so a
    /// stopped-but-created VM still reports a clear "not running" error
    /// rather than "not found".
    pub handle: Option<ContainerHandle>,
}

/// Resolves a hostname to its VM within a range (§4.6 step 1: "build a
/// map hostname → VM restricted to the range").
pub trait VmDirectory: Send + Sync {
    /// Looks up `hostname` within `range_id`.
    ///
    /// # Errors
    /// Returns an error only for a repository failure; an absent
    /// hostname is `Ok(None)`, not an error, so the caller can isolate
    /// the failure to a single action.
    fn find_hostname(&self, range_id: RangeId, hostname: &str) -> Result<Option<VmTarget>>;
}

/// Resolves an artifact name to a local filesystem path ready to hand to
/// [`ContainerRuntime::copy_to`] (§4.6: "the file bytes come from the
/// artifact store").
pub trait ArtifactSource: Send + Sync {
    /// Looks up `filename` among `range_id`'s artifacts.
    ///
    /// # Errors
    /// Returns an error only for a repository/object-store failure; a
    /// missing artifact is `Ok(None)`.
    fn local_path(&self, range_id: RangeId, filename: &str) -> Result<Option<PathBuf>>;
}

/// The outcome of dispatching one action.
struct ActionOutcome {
    summary: String,
    succeeded: bool,
}

/// Executes every action of `inject` against `range_id`'s VMs, in order,
/// isolating failures to the offending action (§4.6).
///
/// # Errors
/// Returns an error only if `inject.is_executable()` is false; individual
/// action failures are recorded in the inject's `execution_log` and
/// terminal status instead of propagating.
pub async fn execute_inject(
    runtime: &dyn ContainerRuntime,
    vms: &dyn VmDirectory,
    artifacts: &dyn ArtifactSource,
    range_id: RangeId,
    inject: &mut Inject,
) -> Result<()> {
    if !inject.is_executable() {
        return Err(CyroidError::validation(format!(
            "inject {} is not in a pending state",
            inject.id
        )));
    }

    inject.status = InjectStatus::Executing;
    inject.executed_at = Some(Utc::now());

    let mut outcomes = Vec::with_capacity(inject.actions.len());
    for action in &inject.actions {
        let outcome = dispatch_action(runtime, vms, artifacts, range_id, action).await;
        outcomes.push(outcome);
    }

    let all_succeeded = outcomes.iter().all(|o| o.succeeded);
    inject.status = if all_succeeded {
        InjectStatus::Completed
    } else {
        InjectStatus::Failed
    };
    inject.execution_log = Some(
        outcomes
            .into_iter()
            .enumerate()
            .map(|(i, o)| format!("[{}] {}", i + 1, o.summary))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    Ok(())
}

/// Marks a pending inject as skipped (§4.6: "A Pending inject may be
/// Skipped by a user; non-Pending injects may not be skipped").
///
/// # Errors
/// Returns a validation error if `inject` is not currently Pending.
pub fn skip_inject(inject: &mut Inject) -> Result<()> {
    if !inject.is_skippable() {
        return Err(CyroidError::validation(format!(
            "inject {} is not pending and cannot be skipped",
            inject.id
        )));
    }
    inject.status = InjectStatus::Skipped;
    Ok(())
}

async fn dispatch_action(
    runtime: &dyn ContainerRuntime,
    vms: &dyn VmDirectory,
    artifacts: &dyn ArtifactSource,
    range_id: RangeId,
    action: &Action,
) -> ActionOutcome {
    match action {
        Action::RunCommand { target_hostname, command } => {
            run_command(runtime, vms, range_id, target_hostname, command).await
        }
        Action::PlaceFile {
            filename,
            target_hostname,
            target_path,
        } => place_file(runtime, vms, artifacts, range_id, target_hostname, filename, target_path).await,
    }
}

async fn resolve_running(
    vms: &dyn VmDirectory,
    range_id: RangeId,
    hostname: &str,
) -> std::result::Result<ContainerHandle, String> {
    match vms.find_hostname(range_id, hostname) {
        Ok(None) => Err(format!("host \"{hostname}\" is not a VM in this range")),
        Ok(Some(target)) if !target.running => {
            Err(format!("host \"{hostname}\" ({}) is not currently running", target.vm_id))
        }
        Ok(Some(target)) => target
            .handle
            .ok_or_else(|| format!("host \"{hostname}\" has no container handle")),
        Err(e) => Err(format!("failed to resolve host \"{hostname}\": {e}")),
    }
}

async fn run_command(
    runtime: &dyn ContainerRuntime,
    vms: &dyn VmDirectory,
    range_id: RangeId,
    hostname: &str,
    command: &str,
) -> ActionOutcome {
    let handle = match resolve_running(vms, range_id, hostname).await {
        Ok(h) => h,
        Err(message) => {
            return ActionOutcome {
                summary: format!("run_command on {hostname}: {message}"),
                succeeded: false,
            }
        }
    };

    let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()];
    match runtime.exec(&handle, &argv, &ExecOptions::default()).await {
        Ok(result) if result.exit_code == 0 => ActionOutcome {
            summary: format!("run_command on {hostname}: exit 0"),
            succeeded: true,
        },
        Ok(result) => ActionOutcome {
            summary: format!(
                "run_command on {hostname}: exit {} — {}",
                result.exit_code, result.output
            ),
            succeeded: false,
        },
        Err(e) => ActionOutcome {
            summary: format!("run_command on {hostname}: {e}"),
            succeeded: false,
        },
    }
}

async fn place_file(
    runtime: &dyn ContainerRuntime,
    vms: &dyn VmDirectory,
    artifacts: &dyn ArtifactSource,
    range_id: RangeId,
    hostname: &str,
    filename: &str,
    target_path: &str,
) -> ActionOutcome {
    let handle = match resolve_running(vms, range_id, hostname).await {
        Ok(h) => h,
        Err(message) => {
            return ActionOutcome {
                summary: format!("place_file {filename} on {hostname}: {message}"),
                succeeded: false,
            }
        }
    };

    let local_path = match artifacts.local_path(range_id, filename) {
        Ok(Some(path)) => path,
        Ok(None) => {
            return ActionOutcome {
                summary: format!("place_file {filename} on {hostname}: artifact not found"),
                succeeded: false,
            }
        }
        Err(e) => {
            return ActionOutcome {
                summary: format!("place_file {filename} on {hostname}: {e}"),
                succeeded: false,
            }
        }
    };

    let (container_dir, file_name) = split_target_path(target_path);
    let source = CopySource {
        local_path,
        container_dir: container_dir.to_string(),
    };
    match runtime.copy_to(&handle, &source).await {
        Ok(()) => ActionOutcome {
            summary: format!("place_file {filename} on {hostname}: placed at {target_path} ({file_name})"),
            succeeded: true,
        },
        Err(e) => ActionOutcome {
            summary: format!("place_file {filename} on {hostname}: {e}"),
            succeeded: false,
        },
    }
}

/// Splits a container path into its parent directory (handed to
/// `copy_to`, which expects a destination directory for its tar stream)
/// and final path segment, defaulting the parent to `/` when the path
/// carries no directory component.
fn split_target_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::ids::InjectId;
    use cyroid_common::ids::MselId;
    use cyroid_runtime::spec::{ExecResult, PullProgress, Stats};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRuntime {
        exec_calls: Mutex<Vec<(String, Vec<String>)>>,
        copy_calls: Mutex<Vec<(String, CopySource)>>,
        exec_exit_code: i64,
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn create_network(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: bool,
            _: &HashMap<String, String>,
        ) -> cyroid_runtime::backend::Result<cyroid_runtime::backend::NetworkHandle> {
            unimplemented!()
        }
        async fn delete_network(&self, _: &cyroid_runtime::backend::NetworkHandle) -> cyroid_runtime::backend::Result<()> {
            unimplemented!()
        }
        async fn create_container(&self, _: &cyroid_runtime::spec::ContainerSpec) -> cyroid_runtime::backend::Result<ContainerHandle> {
            unimplemented!()
        }
        async fn start(&self, _: &ContainerHandle) -> cyroid_runtime::backend::Result<()> {
            unimplemented!()
        }
        async fn stop(&self, _: &ContainerHandle, _: std::time::Duration) -> cyroid_runtime::backend::Result<()> {
            unimplemented!()
        }
        async fn restart(&self, _: &ContainerHandle, _: std::time::Duration) -> cyroid_runtime::backend::Result<()> {
            unimplemented!()
        }
        async fn remove(&self, _: &ContainerHandle) -> cyroid_runtime::backend::Result<()> {
            unimplemented!()
        }
        async fn exec(
            &self,
            handle: &ContainerHandle,
            argv: &[String],
            _: &ExecOptions,
        ) -> cyroid_runtime::backend::Result<ExecResult> {
            self.exec_calls.lock().unwrap().push((handle.0.clone(), argv.to_vec()));
            Ok(ExecResult {
                exit_code: self.exec_exit_code,
                output: "ok".to_string(),
            })
        }
        async fn exec_interactive(
            &self,
            _: &ContainerHandle,
            _: &[String],
        ) -> cyroid_runtime::backend::Result<Box<dyn cyroid_runtime::backend::InteractiveExec>> {
            unimplemented!()
        }
        async fn copy_to(&self, handle: &ContainerHandle, source: &CopySource) -> cyroid_runtime::backend::Result<()> {
            self.copy_calls.lock().unwrap().push((handle.0.clone(), source.clone()));
            Ok(())
        }
        async fn commit(&self, _: &ContainerHandle, _: &str) -> cyroid_runtime::backend::Result<String> {
            unimplemented!()
        }
        async fn pull_stream(
            &self,
            _: &str,
        ) -> cyroid_runtime::backend::Result<futures_util::stream::BoxStream<'static, PullProgress>> {
            unimplemented!()
        }
        async fn stats(&self, _: &ContainerHandle) -> cyroid_runtime::backend::Result<Option<Stats>> {
            unimplemented!()
        }
        async fn container_ip(&self, _: &ContainerHandle) -> cyroid_runtime::backend::Result<Option<String>> {
            unimplemented!()
        }
        async fn list_containers(&self, _: &HashMap<String, String>) -> cyroid_runtime::backend::Result<Vec<ContainerHandle>> {
            unimplemented!()
        }
        async fn list_networks(&self, _: &HashMap<String, String>) -> cyroid_runtime::backend::Result<Vec<cyroid_runtime::backend::NetworkHandle>> {
            unimplemented!()
        }
    }

    struct FakeVms;
    impl VmDirectory for FakeVms {
        fn find_hostname(&self, _: RangeId, hostname: &str) -> Result<Option<VmTarget>> {
            if hostname == "ghost" {
                return Ok(None);
            }
            if hostname == "stopped" {
                return Ok(Some(VmTarget {
                    vm_id: VmId::new(),
                    running: false,
                    handle: Some(ContainerHandle("c-stopped".to_string())),
                }));
            }
            Ok(Some(VmTarget {
                vm_id: VmId::new(),
                running: true,
                handle: Some(ContainerHandle(format!("c-{hostname}"))),
            }))
        }
    }

    struct FakeArtifacts;
    impl ArtifactSource for FakeArtifacts {
        fn local_path(&self, _: RangeId, filename: &str) -> Result<Option<PathBuf>> {
            if filename == "missing.exe" {
                return Ok(None);
            }
            Ok(Some(PathBuf::from(format!("/tmp/{filename}"))))
        }
    }

    fn sample_inject(actions: Vec<Action>) -> Inject {
        Inject {
            id: InjectId::new(),
            msel_id: MselId::new(),
            sequence: 1,
            inject_time_minutes: 0,
            title: "t".to_string(),
            description: String::new(),
            actions,
            status: InjectStatus::Pending,
            executed_at: None,
            execution_log: None,
        }
    }

    #[tokio::test]
    async fn all_actions_succeed_yields_completed() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![Action::RunCommand {
            target_hostname: "web".to_string(),
            command: "echo hi".to_string(),
        }]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Completed);
        assert_eq!(runtime.exec_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failed_action_fails_whole_inject_but_runs_the_rest() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![
            Action::RunCommand {
                target_hostname: "ghost".to_string(),
                command: "echo hi".to_string(),
            },
            Action::RunCommand {
                target_hostname: "web".to_string(),
                command: "echo hi".to_string(),
            },
        ]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Failed);
        assert_eq!(runtime.exec_calls.lock().unwrap().len(), 1);
        assert!(inject.execution_log.unwrap().contains("not a VM"));
    }

    #[tokio::test]
    async fn place_file_resolves_artifact_and_copies() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![Action::PlaceFile {
            filename: "a.exe".to_string(),
            target_hostname: "db".to_string(),
            target_path: "/tmp/a.exe".to_string(),
        }]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Completed);
        let calls = runtime.copy_calls.lock().unwrap();
        assert_eq!(calls[0].1.container_dir, "/tmp");
    }

    #[tokio::test]
    async fn place_file_with_missing_artifact_fails_only_that_action() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![Action::PlaceFile {
            filename: "missing.exe".to_string(),
            target_hostname: "db".to_string(),
            target_path: "/tmp/m.exe".to_string(),
        }]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Failed);
        assert!(inject.execution_log.unwrap().contains("artifact not found"));
    }

    #[tokio::test]
    async fn exec_nonzero_exit_fails_action() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 1,
        };
        let mut inject = sample_inject(vec![Action::RunCommand {
            target_hostname: "web".to_string(),
            command: "false".to_string(),
        }]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Failed);
    }

    #[tokio::test]
    async fn stopped_vm_is_reported_distinctly_from_missing_vm() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![Action::RunCommand {
            target_hostname: "stopped".to_string(),
            command: "echo hi".to_string(),
        }]);
        execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap();
        assert_eq!(inject.status, InjectStatus::Failed);
        assert!(inject.execution_log.unwrap().contains("not currently running"));
    }

    #[tokio::test]
    async fn executing_non_pending_inject_is_rejected() {
        let runtime = FakeRuntime {
            exec_calls: Mutex::new(Vec::new()),
            copy_calls: Mutex::new(Vec::new()),
            exec_exit_code: 0,
        };
        let mut inject = sample_inject(vec![]);
        inject.status = InjectStatus::Completed;
        let err = execute_inject(&runtime, &FakeVms, &FakeArtifacts, RangeId::new(), &mut inject)
            .await
            .unwrap_err();
        assert!(matches!(err, CyroidError::Validation { .. }));
    }

    #[test]
    fn skip_rejects_non_pending() {
        let mut inject = sample_inject(vec![]);
        inject.status = InjectStatus::Failed;
        assert!(skip_inject(&mut inject).is_err());
        inject.status = InjectStatus::Pending;
        assert!(skip_inject(&mut inject).is_ok());
        assert_eq!(inject.status, InjectStatus::Skipped);
    }

    #[test]
    fn split_target_path_handles_root_and_nested() {
        assert_eq!(split_target_path("/tmp/a.exe"), ("/tmp", "a.exe"));
        assert_eq!(split_target_path("/a.exe"), ("/", "a.exe"));
        assert_eq!(split_target_path("a.exe"), ("/", "a.exe"));
    }
}
