//! Enumerated configuration (§6) for the Cyroid orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the Cyroid orchestrator core.
///
/// Each field corresponds directly to a row of §6's configuration table.
/// Out-of-scope collaborators (persistence, blob storage, JWT issuance) are
/// represented only by their connection parameters; the core never
/// constructs those clients itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyroidConfig {
    /// Repository (persistence) endpoint. Opaque to the core.
    pub database_url: String,
    /// Root directory for the ISO/image cache layout (§6).
    pub iso_cache_dir: PathBuf,
    /// Root directory for golden-image template storage.
    pub template_storage_dir: PathBuf,
    /// Per-VM persistent storage root:
    /// `{vm_storage_dir}/{range_id}/{vm_id}/storage`.
    pub vm_storage_dir: PathBuf,
    /// Read-only global shared-folder mount source.
    pub global_shared_dir: PathBuf,
    /// Object-store (MinIO) endpoint for artifact blobs.
    pub minio_endpoint: Option<String>,
    /// Object-store access key.
    pub minio_access_key: Option<String>,
    /// Object-store secret key.
    pub minio_secret_key: Option<String>,
    /// Object-store bucket holding artifact blobs.
    pub minio_bucket: Option<String>,
    /// Background-task broker URL, consumed only via an interface.
    pub redis_url: Option<String>,
    /// Secret used to verify principal tokens upstream of the core.
    pub jwt_secret: Option<String>,
    /// Lifetime of issued tokens.
    pub jwt_ttl: Duration,
}

impl Default for CyroidConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/cyroid".to_string(),
            iso_cache_dir: PathBuf::from(crate::constants::DEFAULT_ISO_CACHE_DIR),
            template_storage_dir: PathBuf::from(crate::constants::DEFAULT_TEMPLATE_STORAGE_DIR),
            vm_storage_dir: PathBuf::from(crate::constants::DEFAULT_VM_STORAGE_DIR),
            global_shared_dir: PathBuf::from(crate::constants::DEFAULT_GLOBAL_SHARED_DIR),
            minio_endpoint: None,
            minio_access_key: None,
            minio_secret_key: None,
            minio_bucket: None,
            redis_url: None,
            jwt_secret: None,
            jwt_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CyroidConfig {
    /// Per-VM persistent storage path for the given range/VM pair.
    #[must_use]
    pub fn vm_storage_path(&self, range_id: crate::ids::RangeId, vm_id: crate::ids::VmId) -> PathBuf {
        self.vm_storage_dir
            .join(range_id.to_string())
            .join(vm_id.to_string())
            .join("storage")
    }

    /// Path to the cached ISO for a given Windows version code.
    #[must_use]
    pub fn windows_iso_path(&self, version: &str) -> PathBuf {
        self.iso_cache_dir
            .join(crate::constants::WINDOWS_ISO_SUBDIR)
            .join(format!("windows-{version}.iso"))
    }

    /// Path to the cached ISO for a given Linux distro code.
    #[must_use]
    pub fn linux_iso_path(&self, distro: &str) -> PathBuf {
        self.iso_cache_dir
            .join(crate::constants::LINUX_ISO_SUBDIR)
            .join(format!("{distro}.iso"))
    }

    /// Directory holding custom (user-uploaded) ISOs and their sidecar
    /// metadata file.
    #[must_use]
    pub fn custom_iso_dir(&self) -> PathBuf {
        self.iso_cache_dir.join(crate::constants::CUSTOM_ISO_SUBDIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_storage_path_nests_range_then_vm() {
        let cfg = CyroidConfig::default();
        let range_id = crate::ids::RangeId::new();
        let vm_id = crate::ids::VmId::new();
        let path = cfg.vm_storage_path(range_id, vm_id);
        assert!(path.ends_with("storage"));
        assert!(path.to_string_lossy().contains(&range_id.to_string()));
        assert!(path.to_string_lossy().contains(&vm_id.to_string()));
    }

    #[test]
    fn windows_iso_path_uses_version_code() {
        let cfg = CyroidConfig::default();
        let path = cfg.windows_iso_path("11");
        assert_eq!(path.file_name().unwrap(), "windows-11.iso");
    }
}
