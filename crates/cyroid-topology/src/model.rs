//! Entities owned by the Topology Orchestrator: ranges, networks, VMs,
//! templates, snapshots, and the artifact/placement pair (§3).

use cyroid_auth::Taggable;
use cyroid_common::ids::{ArtifactId, NetworkId, PrincipalId, RangeId, SnapshotId, TemplateId, VmId};
use cyroid_common::status::{
    ArtifactIndicator, ArtifactKind, DisplayMode, IsolationLevel, NetworkStatus, OsKind,
    PlacementStatus, RangeStatus, VmStatus, VmType,
};
use serde::{Deserialize, Serialize};

/// The closed set of named Linux distributions a template may declare when
/// `os_kind = Linux` (§3's "variant tag"). Invalid strings are rejected at
/// construction rather than accepted and carried through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinuxDistro {
    /// General-purpose distribution.
    Ubuntu,
    /// General-purpose distribution.
    Debian,
    /// General-purpose distribution.
    Fedora,
    /// General-purpose distribution.
    ArchLinux,
    /// Security/offensive-tooling distribution.
    Kali,
    /// Security/offensive-tooling distribution.
    Parrot,
    /// Privacy/anonymity-focused distribution.
    Tails,
}

impl LinuxDistro {
    /// Parses a distro code, rejecting anything outside the closed set.
    ///
    /// # Errors
    /// Returns [`cyroid_common::error::CyroidError::Validation`] for an
    /// unrecognized code.
    pub fn parse(code: &str) -> cyroid_common::error::Result<Self> {
        match code.to_ascii_lowercase().as_str() {
            "ubuntu" => Ok(Self::Ubuntu),
            "debian" => Ok(Self::Debian),
            "fedora" => Ok(Self::Fedora),
            "arch" | "archlinux" => Ok(Self::ArchLinux),
            "kali" => Ok(Self::Kali),
            "parrot" => Ok(Self::Parrot),
            "tails" => Ok(Self::Tails),
            other => Err(cyroid_common::error::CyroidError::validation(format!(
                "unrecognized linux distribution variant: {other}"
            ))),
        }
    }

    /// The lowercase code used in on-disk cache paths and blueprint files.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::ArchLinux => "archlinux",
            Self::Kali => "kali",
            Self::Parrot => "parrot",
            Self::Tails => "tails",
        }
    }
}

/// An isolated multi-network environment (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Range {
    /// Stable identifier.
    pub id: RangeId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Owning principal.
    pub owner_id: PrincipalId,
    /// Lifecycle status, per §4.4's range state machine.
    pub status: RangeStatus,
    /// Visibility tags, checked by [`cyroid_auth::visible`].
    pub tags: Vec<String>,
}

impl Taggable for Range {
    fn owner_id(&self) -> Option<PrincipalId> {
        Some(self.owner_id)
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// An L2/L3 network segment belonging to exactly one range (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Stable identifier.
    pub id: NetworkId,
    /// Owning range.
    pub range_id: RangeId,
    /// Name, unique within the range.
    pub name: String,
    /// CIDR, unique within the range.
    pub subnet: String,
    /// Gateway IP; must fall inside `subnet`.
    pub gateway: String,
    /// Optional DNS server list.
    pub dns: Vec<String>,
    /// Egress isolation level.
    pub isolation_level: IsolationLevel,
    /// Provisioning status.
    pub status: NetworkStatus,
    /// Opaque runtime network handle, set once provisioned.
    pub runtime_handle: Option<String>,
}

/// Windows-specific and display-related extended configuration carried on
/// a VM (§3's "extended config").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmExtendedConfig {
    /// ISO source: a URL to download, or an already-cached local path.
    pub iso_source: Option<String>,
    /// `true` for DHCP, `false` for the static `gateway`/`dns` fields below.
    pub dhcp: bool,
    /// Static gateway, used when `dhcp = false`.
    pub static_gateway: Option<String>,
    /// Static DNS servers, used when `dhcp = false`.
    pub static_dns: Vec<String>,
    /// Size in GB of a second disk, if any.
    pub disk2_gb: Option<u32>,
    /// Size in GB of a third disk, if any.
    pub disk3_gb: Option<u32>,
    /// Whether a per-VM shared folder is mounted.
    pub shared_folder_enabled: bool,
    /// Whether the global read-only shared folder is mounted.
    pub global_shared_enabled: bool,
    /// Skips unattended install, requiring manual interaction.
    pub manual_install: bool,
    /// Windows-only: UI language code.
    pub language: Option<String>,
    /// Windows-only: keyboard layout code.
    pub keyboard: Option<String>,
    /// Windows-only: region code.
    pub region: Option<String>,
    /// Windows-only: login username.
    pub username: Option<String>,
    /// Windows-only: login password.
    pub password: Option<String>,
    /// Linux-VM-only: boot mode selector (e.g. `legacy`, `uefi`).
    pub boot_mode: Option<String>,
    /// Linux-VM-only: disk type selector (e.g. `scsi`, `ide`).
    pub disk_type: Option<String>,
    /// Display mode for VM-in-container and desktop-capable images.
    pub display_mode: DisplayMode,
    /// UI layout position.
    pub position: (i32, i32),
}

/// A unit of compute attached to one primary network (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vm {
    /// Stable identifier.
    pub id: VmId,
    /// Owning range.
    pub range_id: RangeId,
    /// Primary network attachment.
    pub network_id: NetworkId,
    /// Template this VM was synthesized from.
    pub template_id: TemplateId,
    /// DNS-label hostname, unique within the range.
    pub hostname: String,
    /// Static IP on the primary network, unique within that network.
    pub ip_address: String,
    /// CPU core count, in `[1, 32]`.
    pub cpu_count: u32,
    /// RAM in megabytes, in `[512, 131072]`.
    pub ram_mb: u32,
    /// Primary disk size in GB.
    pub disk_gb: u32,
    /// Lifecycle status.
    pub status: VmStatus,
    /// Engine container id, present iff `status` is Creating/Running/Stopped.
    pub runtime_handle: Option<String>,
    /// Extended, mostly-optional configuration.
    pub extended: VmExtendedConfig,
}

impl Vm {
    /// Whether `cpu_count`/`ram_mb` satisfy §3's invariants.
    #[must_use]
    pub fn resource_caps_valid(&self) -> bool {
        let cpu_ok = (cyroid_common::constants::VM_CPU_MIN..=cyroid_common::constants::VM_CPU_MAX)
            .contains(&self.cpu_count);
        let ram_ok = (cyroid_common::constants::VM_RAM_MB_MIN
            ..=cyroid_common::constants::VM_RAM_MB_MAX)
            .contains(&self.ram_mb);
        cpu_ok && ram_ok
    }

    /// Whether a runtime handle is present exactly when required (§3).
    #[must_use]
    pub fn handle_invariant_holds(&self) -> bool {
        let requires_handle = matches!(self.status, VmStatus::Creating | VmStatus::Running | VmStatus::Stopped);
        requires_handle == self.runtime_handle.is_some()
    }
}

/// A reusable VM configuration template (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmTemplate {
    /// Stable identifier.
    pub id: TemplateId,
    /// Display name.
    pub name: String,
    /// Operating system family.
    pub os_kind: OsKind,
    /// Linux distribution, set iff `os_kind = Linux`.
    pub linux_distro: Option<LinuxDistro>,
    /// Base container image reference.
    pub base_image: String,
    /// Which of C5's three synthesis modes this template produces.
    pub vm_type: VmType,
    /// Default CPU core count for VMs created from this template.
    pub default_cpu: u32,
    /// Default RAM in megabytes.
    pub default_ram_mb: u32,
    /// Default primary disk size in GB.
    pub default_disk_gb: u32,
    /// Shell/PowerShell text executed after first boot, for plain
    /// containers, or synthesized into an OEM `install.bat` for Windows.
    pub post_install_script: Option<String>,
    /// Pre-populated persistent-storage tree to seed new VMs' storage with.
    pub golden_image_path: Option<String>,
    /// Pre-cached ISO path, bypassing a fresh download.
    pub cached_iso_path: Option<String>,
    /// Visibility tags.
    pub tags: Vec<String>,
    /// Owning principal.
    pub owner_id: PrincipalId,
}

impl Taggable for VmTemplate {
    fn owner_id(&self) -> Option<PrincipalId> {
        Some(self.owner_id)
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A committed container image captured from a running VM (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stable identifier.
    pub id: SnapshotId,
    /// Source VM at capture time.
    pub vm_id: VmId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Engine image reference produced by the commit.
    pub runtime_image_id: String,
}

/// An uploaded file available to place into VMs (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable identifier.
    pub id: ArtifactId,
    /// Owning range (artifacts are scoped to the range they were uploaded
    /// into, per §4.6's "range's uploaded artifacts" resolution rule).
    pub range_id: RangeId,
    /// Display/file name, matched against `place_file` actions by exact
    /// string equality.
    pub name: String,
    /// Path in the external content-addressed blob store.
    pub blob_path: String,
    /// SHA-256 of the blob.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
    /// Coarse file kind.
    pub kind: ArtifactKind,
    /// Risk indicator set by the uploader.
    pub indicator: ArtifactIndicator,
    /// TTP references (e.g. MITRE ATT&CK ids).
    pub ttps: Vec<String>,
    /// Visibility tags.
    pub tags: Vec<String>,
    /// Uploading principal.
    pub uploader_id: PrincipalId,
}

impl Taggable for Artifact {
    fn owner_id(&self) -> Option<PrincipalId> {
        Some(self.uploader_id)
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Record of one artifact being copied onto one VM (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPlacement {
    /// Stable identifier.
    pub id: uuid::Uuid,
    /// Placed artifact.
    pub artifact_id: ArtifactId,
    /// Destination VM.
    pub vm_id: VmId,
    /// Destination path inside the container.
    pub target_path: String,
    /// Lifecycle status.
    pub status: PlacementStatus,
    /// Error text, set iff `status = Failed`.
    pub error: Option<String>,
}
