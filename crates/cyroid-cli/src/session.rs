//! Local session persistence (`--state-file`) and the built-in template
//! catalog seeded on first run.
//!
//! The core's repository is an external collaborator (§1) with no
//! concrete implementation in scope; this CLI is a standalone convenience
//! adapter (§11), so it keeps its own small JSON snapshot of the
//! in-memory reference repository between invocations rather than
//! requiring a real database. Similarly, the CLI has no login flow (JWT
//! issuance is out of scope), so every invocation acts as one fixed local
//! operator principal.

use std::path::Path;
use std::sync::Arc;

use cyroid_auth::Principal;
use cyroid_common::ids::{PrincipalId, TemplateId};
use cyroid_common::status::{OsKind, VmType};
use cyroid_sdk::{InMemoryRepository, PrincipalStore, SessionSnapshot};
use cyroid_topology::model::{LinuxDistro, VmTemplate};
use uuid::Uuid;

/// Stable id for the CLI's one local operator principal.
#[must_use]
pub fn operator_id() -> PrincipalId {
    PrincipalId::from_uuid(Uuid::nil())
}

fn builtin_templates(owner_id: PrincipalId) -> Vec<VmTemplate> {
    vec![
        VmTemplate {
            id: TemplateId::from_uuid(Uuid::from_u128(1)),
            name: "nginx-alpine".to_string(),
            os_kind: OsKind::Linux,
            linux_distro: None,
            base_image: "nginx:alpine".to_string(),
            vm_type: VmType::Container,
            default_cpu: 1,
            default_ram_mb: 512,
            default_disk_gb: 5,
            post_install_script: None,
            golden_image_path: None,
            cached_iso_path: None,
            tags: Vec::new(),
            owner_id,
        },
        VmTemplate {
            id: TemplateId::from_uuid(Uuid::from_u128(2)),
            name: "postgres-16".to_string(),
            os_kind: OsKind::Linux,
            linux_distro: None,
            base_image: "postgres:16".to_string(),
            vm_type: VmType::Container,
            default_cpu: 2,
            default_ram_mb: 1024,
            default_disk_gb: 20,
            post_install_script: None,
            golden_image_path: None,
            cached_iso_path: None,
            tags: Vec::new(),
            owner_id,
        },
        VmTemplate {
            id: TemplateId::from_uuid(Uuid::from_u128(3)),
            name: "kali-desktop".to_string(),
            os_kind: OsKind::Linux,
            linux_distro: Some(LinuxDistro::Kali),
            base_image: "lscr.io/linuxserver/webtop:kali-kde".to_string(),
            vm_type: VmType::Container,
            default_cpu: 2,
            default_ram_mb: 4096,
            default_disk_gb: 20,
            post_install_script: None,
            golden_image_path: None,
            cached_iso_path: None,
            tags: Vec::new(),
            owner_id,
        },
    ]
}

/// Loads the repository from `state_file` if it exists; otherwise starts
/// a fresh one seeded with the built-in template catalog and the local
/// operator principal.
///
/// # Errors
/// Returns an error if `state_file` exists but cannot be read or parsed.
pub fn load(state_file: &Path) -> anyhow::Result<Arc<InMemoryRepository>> {
    if state_file.exists() {
        let text = std::fs::read_to_string(state_file)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&text)?;
        tracing::debug!(path = %state_file.display(), "loaded cli session state");
        return Ok(Arc::new(InMemoryRepository::from_snapshot(snapshot)));
    }

    let repo = InMemoryRepository::new();
    for template in builtin_templates(operator_id()) {
        repo.seed_template(template);
    }
    let operator = Principal::new(operator_id()).as_admin();
    repo.put_principal(&operator)?;
    tracing::debug!("starting a fresh cli session with the built-in template catalog");
    Ok(Arc::new(repo))
}

/// Persists `repo`'s current contents back to `state_file`.
///
/// # Errors
/// Returns an error if `state_file`'s parent directory cannot be created
/// or the snapshot cannot be written.
pub fn save(state_file: &Path, repo: &InMemoryRepository) -> anyhow::Result<()> {
    if let Some(parent) = state_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let snapshot = repo.snapshot();
    let text = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(state_file, text)?;
    tracing::debug!(path = %state_file.display(), "saved cli session state");
    Ok(())
}
