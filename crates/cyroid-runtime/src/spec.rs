//! Value types passed across the [`crate::ContainerRuntime`] boundary.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Declarative description of a container to create.
///
/// Mirrors the parameters `docker_service.create_container`/
/// `create_windows_container`/`create_linux_vm_container` take in the
/// reference implementation, generalized into one shape so C5's three
/// synthesis modes can all produce the same [`ContainerSpec`].
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name (must be unique on the engine).
    pub name: String,
    /// Image reference to run.
    pub image: String,
    /// Container hostname.
    pub hostname: String,
    /// Id of the range network to attach to with a static IP, after the
    /// routing network (§4.1's "attachment order matters" rule).
    pub network_id: String,
    /// Static IPv4 address on `network_id`.
    pub ip_address: String,
    /// CPU core limit.
    pub cpu_count: u32,
    /// Memory limit in megabytes.
    pub memory_mb: u32,
    /// Bind mounts, each as `host_path:container_path[:ro]`.
    pub binds: Vec<String>,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Engine labels (must include `cyroid.range_id` / `cyroid.vm_id` for
    /// teardown filtering, plus any reverse-proxy labels from C5).
    pub labels: HashMap<String, String>,
    /// Whether the container runs privileged (required for KVM passthrough).
    pub privileged: bool,
    /// Host devices to pass through, e.g. `/dev/kvm:/dev/kvm`.
    pub devices: Vec<String>,
    /// Linux capabilities to add (e.g. `NET_ADMIN` for VM-in-container images).
    pub cap_add: Vec<String>,
    /// Restart policy name, e.g. `unless-stopped`.
    pub restart_policy: String,
}

impl ContainerSpec {
    /// Starts building a spec with the fields common to every synthesis
    /// mode populated, and the rest defaulted.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            hostname: String::new(),
            network_id: String::new(),
            ip_address: String::new(),
            cpu_count: 1,
            memory_mb: 512,
            binds: Vec::new(),
            env: HashMap::new(),
            labels: HashMap::new(),
            privileged: false,
            devices: Vec::new(),
            cap_add: Vec::new(),
            restart_policy: "unless-stopped".to_string(),
        }
    }
}

/// Options controlling a single `exec` invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// User to run the command as, e.g. `root`.
    pub user: Option<String>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Additional environment variables for this exec only.
    pub env: Vec<(String, String)>,
    /// Whether to allocate a PTY.
    pub tty: bool,
}

/// Result of a non-interactive `exec` call.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Process exit code.
    pub exit_code: i64,
    /// Combined stdout+stderr.
    pub output: String,
}

/// One record in a `pull_stream` progress sequence (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullProgress {
    /// A layer is actively downloading.
    Layer {
        /// Layer digest/id as reported by the engine.
        layer_id: String,
        /// Bytes downloaded so far for this layer.
        bytes_current: u64,
        /// Total bytes for this layer, if known.
        bytes_total: Option<u64>,
        /// Current status string, e.g. `pulling`.
        status: LayerStatus,
    },
    /// The pull finished successfully.
    Complete,
    /// The pull failed.
    Error {
        /// Human-readable failure message.
        message: String,
    },
}

/// Status of one layer within a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    /// Actively transferring.
    Pulling,
    /// Finished transferring.
    Complete,
    /// Already present locally; nothing transferred.
    AlreadyExists,
}

/// Point-in-time resource usage for a running container (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stats {
    /// CPU usage, normalized to 0-100% across all cores.
    pub cpu_pct: f64,
    /// Memory usage in megabytes.
    pub mem_mb: f64,
    /// Memory usage as a percentage of the container's limit.
    pub mem_pct: f64,
    /// Cumulative bytes received on all attached networks.
    pub rx_bytes: u64,
    /// Cumulative bytes transmitted on all attached networks.
    pub tx_bytes: u64,
}

/// Local filesystem source for a `copy_to` call.
#[derive(Debug, Clone)]
pub struct CopySource {
    /// Path on the host.
    pub local_path: PathBuf,
    /// Destination directory inside the container.
    pub container_dir: String,
}
