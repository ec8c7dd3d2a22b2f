//! The [`ContainerRuntime`] trait: C1's public contract.
//!
//! Every operation is either idempotent on "not found" or documented as
//! such; the adapter itself never retries (§4.1, §7's propagation rule
//! puts retry policy on the caller).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::spec::{ContainerSpec, CopySource, ExecOptions, ExecResult, PullProgress, Stats};

/// Opaque handle to an engine-side network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkHandle(pub String);

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an engine-side container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub String);

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure kinds surfaced by the runtime adapter (§7: taxonomy items 5-6).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine is unreachable or an operation timed out; the caller
    /// should mark the owning entity Error and journal, not retry.
    #[error("transient runtime error: {0}")]
    Transient(String),
    /// An operation like `commit` failed in a way that needs operator
    /// intervention.
    #[error("unrecoverable runtime error: {0}")]
    Unrecoverable(String),
    /// The requested subnet, name, or handle already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A call that is not one of the idempotent "not found is success"
    /// paths referenced an entity the engine does not have.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<RuntimeError> for cyroid_common::error::CyroidError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Transient(m) => Self::transient(m),
            RuntimeError::Unrecoverable(m) => Self::unrecoverable(m),
            RuntimeError::Conflict(m) => Self::conflict(m),
            RuntimeError::NotFound(m) => Self::not_found("engine resource", m),
        }
    }
}

/// Result alias for runtime adapter operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// A duplex byte stream driving an interactive `exec` session, used by the
/// session multiplexer (C7) to bridge a PTY to a WebSocket.
#[async_trait]
pub trait InteractiveExec: Send {
    /// Reads up to `buf.len()` bytes, Docker stream-header bytes included.
    /// Returns `Ok(0)` on EOF.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes bytes to the exec's stdin.
    async fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// The Container Runtime Adapter's public contract (C1).
///
/// Implementors are stateless facades: all mutable state lives in the
/// container engine itself. Every method is safe to call concurrently for
/// distinct handles; callers serialize operations on a *single* handle
/// themselves (the topology orchestrator's per-range lock, §5).
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a network. `internal` disables egress outside the engine's
    /// host. Labels must carry the owning range id for later teardown
    /// filtering.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Conflict`] if the subnet collides with an
    /// existing network.
    async fn create_network(
        &self,
        name: &str,
        subnet: &str,
        gateway: &str,
        internal: bool,
        labels: &HashMap<String, String>,
    ) -> Result<NetworkHandle>;

    /// Deletes a network. Idempotent: a not-found handle returns `Ok(())`.
    async fn delete_network(&self, handle: &NetworkHandle) -> Result<()>;

    /// Creates a container from `spec`. Per §4.1, implementations attach
    /// the container to the shared routing network first (for a stable
    /// reverse-proxy IP), then to `spec.network_id` with `spec.ip_address`.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;

    /// Starts a container. Idempotent on "already started".
    async fn start(&self, handle: &ContainerHandle) -> Result<()>;

    /// Stops a container, allowing `grace` for a clean shutdown.
    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> Result<()>;

    /// Restarts a container.
    async fn restart(&self, handle: &ContainerHandle, grace: Duration) -> Result<()>;

    /// Force-removes a container. Idempotent: not-found returns `Ok(())`.
    async fn remove(&self, handle: &ContainerHandle) -> Result<()>;

    /// Runs `argv` to completion inside a running container and returns the
    /// exit code plus combined stdout/stderr.
    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: &[String],
        opts: &ExecOptions,
    ) -> Result<ExecResult>;

    /// Starts a PTY-attached interactive exec session, returned as a duplex
    /// byte stream. Used by the session multiplexer for console access.
    async fn exec_interactive(
        &self,
        handle: &ContainerHandle,
        argv: &[String],
    ) -> Result<Box<dyn InteractiveExec>>;

    /// Packages `source.local_path` as a tar stream and copies it into
    /// `source.container_dir` inside the container.
    async fn copy_to(&self, handle: &ContainerHandle, source: &CopySource) -> Result<()>;

    /// Commits a running container's filesystem to a new image
    /// `repo:tag`, returning the new image reference.
    async fn commit(&self, handle: &ContainerHandle, repo_tag: &str) -> Result<String>;

    /// Begins pulling `image`, returning a finite, non-restartable sequence
    /// of progress records terminated by `PullProgress::Complete` or
    /// `PullProgress::Error`.
    async fn pull_stream(
        &self,
        image: &str,
    ) -> Result<futures_util::stream::BoxStream<'static, PullProgress>>;

    /// Returns point-in-time resource usage, or `Ok(None)` if the
    /// container is not currently running.
    async fn stats(&self, handle: &ContainerHandle) -> Result<Option<Stats>>;

    /// Returns the first IP address found on any network the container is
    /// attached to, used by the VNC proxy to dial the upstream websockify
    /// server directly.
    async fn container_ip(&self, handle: &ContainerHandle) -> Result<Option<String>>;

    /// Lists containers matching every key/value pair in `label_filter`.
    async fn list_containers(
        &self,
        label_filter: &HashMap<String, String>,
    ) -> Result<Vec<ContainerHandle>>;

    /// Lists networks matching every key/value pair in `label_filter`.
    async fn list_networks(
        &self,
        label_filter: &HashMap<String, String>,
    ) -> Result<Vec<NetworkHandle>>;

    /// Ensures `image` is present locally, pulling it if necessary and
    /// draining the progress stream to completion. A convenience built on
    /// top of [`ContainerRuntime::pull_stream`] for callers that do not
    /// need live progress (e.g. C4's deploy plan).
    async fn ensure_image(&self, image: &str) -> Result<()> {
        use futures_util::StreamExt;

        let mut stream = self.pull_stream(image).await?;
        while let Some(progress) = stream.next().await {
            if let PullProgress::Error { message } = progress {
                return Err(RuntimeError::Transient(message));
            }
        }
        Ok(())
    }
}
