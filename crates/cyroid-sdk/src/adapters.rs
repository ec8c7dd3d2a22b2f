//! Thin adapters from a [`Repository`] to the narrow ports each domain
//! crate expects, so `cyroid-msel`, `cyroid-journal`, and
//! `cyroid-session` stay decoupled from `cyroid-topology`'s entity types
//! (§9's "constructor injection, not implicit globals" guidance).

use std::path::PathBuf;

use cyroid_common::error::Result;
use cyroid_common::ids::{RangeId, VmId};
use cyroid_common::status::VmStatus;
use cyroid_journal::VmIpResolver;
use cyroid_msel::{ArtifactSource, VmDirectory, VmTarget};
use cyroid_runtime::ContainerHandle;
use cyroid_session::{RangeStatusSource, StatusSnapshot};

use crate::repository::Repository;

/// Resolves an action's target hostname to a VM by scanning the range's
/// VMs, for [`cyroid_msel::execute_inject`].
pub struct RepoVmDirectory<'a> {
    repo: &'a dyn Repository,
}

impl<'a> RepoVmDirectory<'a> {
    /// Wraps `repo` as a [`VmDirectory`].
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }
}

impl VmDirectory for RepoVmDirectory<'_> {
    fn find_hostname(&self, range_id: RangeId, hostname: &str) -> Result<Option<VmTarget>> {
        Ok(self.repo.list_vms(range_id)?.into_iter().find(|v| v.hostname == hostname).map(|v| {
            VmTarget {
                vm_id: v.id,
                running: matches!(v.status, VmStatus::Running),
                handle: v.runtime_handle.map(ContainerHandle),
            }
        }))
    }
}

/// Resolves a `place_file` action's artifact name to a local path, for
/// [`cyroid_msel::execute_inject`]. In this reference implementation the
/// artifact's `blob_path` already points at a local, readable path —
/// object-store upload/download is an external collaborator out of
/// scope for the core (§9.4).
pub struct RepoArtifactSource<'a> {
    repo: &'a dyn Repository,
}

impl<'a> RepoArtifactSource<'a> {
    /// Wraps `repo` as an [`ArtifactSource`].
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }
}

impl ArtifactSource for RepoArtifactSource<'_> {
    fn local_path(&self, range_id: RangeId, filename: &str) -> Result<Option<PathBuf>> {
        Ok(self
            .repo
            .find_artifact_by_name(range_id, filename)?
            .map(|artifact| PathBuf::from(artifact.blob_path)))
    }
}

/// Resolves an IP observed by an external flow probe to the VM attached
/// to it, for [`cyroid_journal::resolve_connection`].
pub struct RepoVmIpResolver<'a> {
    repo: &'a dyn Repository,
}

impl<'a> RepoVmIpResolver<'a> {
    /// Wraps `repo` as a [`VmIpResolver`].
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }
}

impl VmIpResolver for RepoVmIpResolver<'_> {
    fn resolve_by_ip(&self, range_id: RangeId, ip: &str) -> Result<Option<VmId>> {
        Ok(self.repo.list_vms(range_id)?.into_iter().find(|v| v.ip_address == ip).map(|v| v.id))
    }
}

/// Samples a range's and its VMs' current statuses for the status
/// WebSocket's coalescing poller (§4.7).
pub struct RepoStatusSource<'a> {
    repo: &'a dyn Repository,
}

impl<'a> RepoStatusSource<'a> {
    /// Wraps `repo` as a [`RangeStatusSource`].
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }
}

#[async_trait::async_trait]
impl RangeStatusSource for RepoStatusSource<'_> {
    async fn snapshot(&self, range_id: RangeId) -> Result<StatusSnapshot> {
        let range = self.repo.get_range(range_id)?;
        let vm_statuses = self.repo.list_vms(range_id)?.into_iter().map(|v| (v.id, v.status)).collect();
        Ok(StatusSnapshot { range_status: range.status, vm_statuses })
    }
}
