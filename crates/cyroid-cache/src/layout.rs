//! On-disk cache layout (§6) and the custom-ISO sidecar metadata file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cyroid_common::config::CyroidConfig;
use cyroid_common::error::{CyroidError, Result};

use crate::entry::{CustomIsoMetadata, IsoKind};

/// Final on-disk path for an ISO of the given kind/name, per §6's layout.
#[must_use]
pub fn final_path(config: &CyroidConfig, kind: IsoKind, name: &str) -> PathBuf {
    match kind {
        IsoKind::Windows => config.windows_iso_path(name),
        IsoKind::Linux => config.linux_iso_path(name),
        IsoKind::Custom => {
            let sanitized = sanitize(name);
            let file_name = if sanitized.ends_with(".iso") {
                sanitized
            } else {
                format!("{sanitized}.iso")
            };
            config.custom_iso_dir().join(file_name)
        }
    }
}

/// Sanitizes a user-supplied filename for safe use as a path component:
/// strips any directory separators and restricts to a conservative
/// character set.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reads the custom-ISO sidecar metadata map, or an empty map if the file
/// does not exist yet.
///
/// # Errors
/// Returns [`CyroidError::Serialization`] if the file exists but is not
/// valid JSON.
pub fn read_custom_metadata(config: &CyroidConfig) -> Result<HashMap<String, CustomIsoMetadata>> {
    let path = config.custom_iso_dir().join(cyroid_common::constants::CUSTOM_ISO_METADATA_FILE);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| CyroidError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes the custom-ISO sidecar metadata map, creating the parent
/// directory if needed.
///
/// # Errors
/// Returns [`CyroidError::Io`] if the directory or file cannot be written.
pub fn write_custom_metadata(
    config: &CyroidConfig,
    entries: &HashMap<String, CustomIsoMetadata>,
) -> Result<()> {
    let dir = config.custom_iso_dir();
    std::fs::create_dir_all(&dir).map_err(|e| CyroidError::Io {
        path: dir.clone(),
        source: e,
    })?;
    let path = dir.join(cyroid_common::constants::CUSTOM_ISO_METADATA_FILE);
    let raw = serde_json::to_string_pretty(entries)?;
    std::fs::write(&path, raw).map_err(|e| CyroidError::Io { path, source: e })
}

/// Records or updates one entry in the custom-ISO sidecar metadata file.
///
/// # Errors
/// Propagates I/O and serialization errors from the read/write round trip.
pub fn upsert_custom_metadata(
    config: &CyroidConfig,
    filename: &str,
    metadata: CustomIsoMetadata,
) -> Result<()> {
    let mut entries = read_custom_metadata(config)?;
    entries.insert(filename.to_string(), metadata);
    write_custom_metadata(config, &entries)
}

/// Atomically places `tmp_path`'s contents at `final_path`: write to a
/// temp name in the same directory, then rename, so a reader never
/// observes a partially-written file (§4.2's atomicity invariant).
///
/// # Errors
/// Returns [`CyroidError::Io`] if the parent directory cannot be created
/// or the rename fails.
pub fn atomic_place(tmp_path: &Path, final_path: &Path) -> Result<()> {
    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CyroidError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::rename(tmp_path, final_path).map_err(|e| CyroidError::Io {
        path: final_path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize("red-team_v2.1.iso"), "red-team_v2.1.iso");
    }

    #[test]
    fn final_path_windows_matches_layout() {
        let config = CyroidConfig::default();
        let path = final_path(&config, IsoKind::Windows, "11");
        assert_eq!(path.file_name().unwrap(), "windows-11.iso");
        assert!(path.to_string_lossy().contains("windows-isos"));
    }

    #[test]
    fn final_path_custom_sanitizes_name_without_doubling_extension() {
        let config = CyroidConfig::default();
        let path = final_path(&config, IsoKind::Custom, "my cool iso!.iso");
        assert_eq!(path.file_name().unwrap(), "my_cool_iso_.iso");
    }

    #[test]
    fn final_path_custom_appends_extension_when_missing() {
        let config = CyroidConfig::default();
        let path = final_path(&config, IsoKind::Custom, "red-team-lab");
        assert_eq!(path.file_name().unwrap(), "red-team-lab.iso");
    }
}
