//! Key and status types for the in-flight cache registry.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of ISO a [`CacheKey::Iso`] refers to, per §6's on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsoKind {
    /// `{root}/windows-isos/windows-{version}.iso`.
    Windows,
    /// `{root}/linux-isos/{distro}.iso`.
    Linux,
    /// `{root}/custom-isos/{sanitized_name}.iso` plus sidecar metadata.
    Custom,
}

/// Identifies a single in-flight or completed cache operation.
///
/// Image pulls are keyed by image reference; ISO downloads are keyed by
/// `(kind, version_or_name)` — the spec's "(version-code, source-url)"
/// pairing collapses to kind+name here since the URL only matters for
/// the download itself, not for identifying the slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheKey {
    /// A container image pull, keyed by its reference (`repo:tag`).
    Image {
        /// Image reference, e.g. `nginx:alpine`.
        image: String,
    },
    /// An ISO download or upload, keyed by family and version/name.
    Iso {
        /// Which on-disk subdirectory this belongs under.
        iso_kind: IsoKind,
        /// Version code (Windows/Linux) or sanitized filename (custom).
        name: String,
    },
}

impl CacheKey {
    /// A stable string form suitable for use as a map key or log field.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Image { image } => format!("image:{image}"),
            Self::Iso { iso_kind, name } => format!("iso:{iso_kind:?}:{name}").to_lowercase(),
        }
    }
}

/// Externally observable state of a cache entry (§4.2's `status` contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    /// A container image pull is in progress.
    Pulling {
        /// Bytes transferred so far, summed across layers.
        bytes_done: u64,
        /// Total bytes across layers, if known.
        bytes_total: Option<u64>,
        /// Aggregate percent, capped at 99 until the image is verified
        /// present (§4.2).
        percent: Option<f64>,
    },
    /// An HTTP download is in progress.
    Downloading {
        /// Bytes transferred so far.
        bytes_done: u64,
        /// Total bytes, if the server reported `Content-Length`.
        bytes_total: Option<u64>,
        /// Percent complete, if `bytes_total` is known.
        percent: Option<f64>,
    },
    /// Archive extraction is in progress, following a completed download.
    Extracting,
    /// Finished successfully; the file is visible at its final path.
    Completed {
        /// Final byte size of the cached file.
        bytes_done: u64,
    },
    /// Terminated with an error.
    Failed {
        /// Human-readable failure message.
        error: String,
    },
    /// Cancelled by the caller before completion.
    Cancelled,
    /// No entry exists for this key (never started, or evicted after the
    /// terminal grace window).
    NotFound,
}

/// Sidecar metadata persisted for custom (user-uploaded) ISOs, one entry
/// per filename, stored in `metadata.json` under the custom-isos
/// directory (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomIsoMetadata {
    /// Display name provided at upload time.
    pub name: String,
    /// Source URL, if downloaded rather than uploaded directly.
    pub url: Option<String>,
    /// When the ISO finished downloading/uploading.
    pub downloaded_at: chrono::DateTime<chrono::Utc>,
    /// Whether this ISO was unpacked from an archive.
    pub extracted_from_archive: bool,
}

/// Final on-disk location and size of a completed cache entry.
#[derive(Debug, Clone)]
pub struct CachedFile {
    /// Final path of the cached file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Content hash, when computed (images do not carry one; downloads do).
    pub sha256: Option<String>,
}
