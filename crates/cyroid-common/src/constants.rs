//! System-wide constants: default paths, well-known network names, and
//! fixed ports from the external interface contracts in §6.

/// Name of the shared routing network every desktop-capable VM is attached
/// to first, so the reverse proxy always has a stable backend IP.
pub const ROUTING_NETWORK_NAME: &str = "cyroid-routing";

/// Application name used in CLI output and journal entries.
pub const APP_NAME: &str = "cyroid";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "cyroidctl";

/// Default root for the ISO/image cache layout (§6).
pub const DEFAULT_ISO_CACHE_DIR: &str = "/var/lib/cyroid/cache";

/// Default root for golden-image template storage.
pub const DEFAULT_TEMPLATE_STORAGE_DIR: &str = "/var/lib/cyroid/templates";

/// Default root for per-VM persistent storage.
pub const DEFAULT_VM_STORAGE_DIR: &str = "/var/lib/cyroid/vms";

/// Default read-only global shared-folder source.
pub const DEFAULT_GLOBAL_SHARED_DIR: &str = "/var/lib/cyroid/shared";

/// Subdirectory name for cached Windows ISOs.
pub const WINDOWS_ISO_SUBDIR: &str = "windows-isos";

/// Subdirectory name for cached Linux ISOs.
pub const LINUX_ISO_SUBDIR: &str = "linux-isos";

/// Subdirectory name for user-uploaded custom ISOs.
pub const CUSTOM_ISO_SUBDIR: &str = "custom-isos";

/// Sidecar metadata file name for custom ISOs.
pub const CUSTOM_ISO_METADATA_FILE: &str = "metadata.json";

/// Backend port for KasmVNC-family desktop images.
pub const VNC_PORT_KASM: u16 = 6901;

/// Backend port for LinuxServer-family desktop images.
pub const VNC_PORT_LINUXSERVER: u16 = 3000;

/// Backend port for the default (non-KasmVNC, non-LinuxServer) desktop family.
pub const VNC_PORT_DEFAULT_DESKTOP: u16 = VNC_PORT_KASM;

/// Backend port for both Linux-VM-in-container and Windows-VM-in-container
/// web consoles (qemus/qemu and dockur/windows both serve on this port).
pub const VNC_PORT_VM_CONSOLE: u16 = 8006;

/// Upstream port noVNC/websockify listens on inside a VM-console container,
/// dialed directly by the session multiplexer's VNC proxy.
pub const VNC_WEBSOCKET_PORT: u16 = VNC_PORT_VM_CONSOLE;

/// Grace period before a terminal cache entry is evicted from the
/// in-flight registry (§4.2, §9).
pub const CACHE_TERMINAL_GRACE: std::time::Duration = std::time::Duration::from_secs(3);

/// Default chunk size for streamed downloads.
pub const DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

/// Default per-transfer timeout.
pub const DOWNLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Default container-stop grace timeout.
pub const CONTAINER_STOP_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

/// Status websocket poll interval.
pub const STATUS_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Archive file extensions recognized by the cache manager's extraction
/// policy (§4.2), longest-suffix-first so compound extensions match before
/// their final-segment counterparts.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".txz", ".zip", ".7z", ".rar", ".gz",
    ".bz2", ".xz", ".lzma",
];

/// WebSocket close code used when authentication fails.
pub const WS_CLOSE_UNAUTHORIZED: u16 = 4001;

/// WebSocket close code used when the referenced resource does not exist.
pub const WS_CLOSE_NOT_FOUND: u16 = 4004;

/// WebSocket close code used for an otherwise-unrecoverable error.
pub const WS_CLOSE_ERROR: u16 = 4000;

/// Minimum legal VM CPU core count.
pub const VM_CPU_MIN: u32 = 1;

/// Maximum legal VM CPU core count.
pub const VM_CPU_MAX: u32 = 32;

/// Minimum legal VM RAM, in megabytes.
pub const VM_RAM_MB_MIN: u32 = 512;

/// Maximum legal VM RAM, in megabytes.
pub const VM_RAM_MB_MAX: u32 = 128 * 1024;

/// Default path for the CLI's local session snapshot (`--state-file`),
/// since the core's repository is an external collaborator (§1) and the
/// CLI is its own convenience adapter (§11) with nothing else to persist
/// ranges/templates/principals between invocations.
pub const DEFAULT_STATE_FILE: &str = "/var/lib/cyroid/cli-state.json";
