//! The process-wide in-flight registry (§4.2, §5's "single process-wide
//! map protected by a mutex" shared-resource policy).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cyroid_common::config::CyroidConfig;
use cyroid_common::constants::CACHE_TERMINAL_GRACE;
use cyroid_common::error::{CyroidError, Result};
use cyroid_runtime::{ContainerRuntime, PullProgress};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::archive;
use crate::entry::{CacheKey, CacheStatus, CachedFile, CustomIsoMetadata, IsoKind};
use crate::layout;

struct InFlight {
    status: Arc<RwLock<CacheStatus>>,
    cancelled: Arc<AtomicBool>,
}

/// Terminal result of a background pull/download worker, distinguishing a
/// caller-requested cancellation from a genuine failure so `status(key)`
/// reports `cancelled` rather than `failed` (§4.2, §8 "cache atomicity").
enum WorkerOutcome {
    Completed(u64),
    Cancelled,
    Failed(CyroidError),
}

/// The Cache Manager (C2): tracks in-flight and recently-completed
/// downloads/pulls and mediates archive extraction and atomic placement.
///
/// Cheap to clone: the registry map is behind an `Arc<Mutex<_>>`, matching
/// the "initialize once, pass as an explicit parameter" guidance for
/// process-wide singletons.
#[derive(Clone)]
pub struct CacheManager {
    config: Arc<CyroidConfig>,
    runtime: Arc<dyn ContainerRuntime>,
    http: reqwest::Client,
    inflight: Arc<std::sync::Mutex<HashMap<String, InFlight>>>,
}

impl CacheManager {
    /// Builds a cache manager over the given configuration and runtime
    /// adapter (used for image pulls).
    #[must_use]
    pub fn new(config: CyroidConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
            http: reqwest::Client::new(),
            inflight: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Begins pulling `image` in the background.
    ///
    /// # Errors
    /// Returns [`CyroidError::Conflict`] if a pull for this image is
    /// already in flight.
    pub fn start_pull(&self, image: &str) -> Result<CacheKey> {
        let key = CacheKey::Image {
            image: image.to_string(),
        };
        let status = Arc::new(RwLock::new(CacheStatus::Pulling {
            bytes_done: 0,
            bytes_total: None,
            percent: Some(0.0),
        }));
        let cancelled = Arc::new(AtomicBool::new(false));
        self.reserve_slot(&key, &status, &cancelled)?;

        let runtime = Arc::clone(&self.runtime);
        let image = image.to_string();
        let status_task = Arc::clone(&status);
        let cancelled_task = Arc::clone(&cancelled);
        let inflight = Arc::clone(&self.inflight);
        let key_string = key.as_string();

        tokio::spawn(async move {
            let outcome = run_pull(&runtime, &image, &status_task, &cancelled_task).await;
            finish(&status_task, &inflight, &key_string, outcome).await;
        });

        Ok(key)
    }

    /// Begins downloading an ISO from `url` into this kind/name's cache
    /// slot, streaming to a temp file and optionally extracting it if the
    /// source is a recognized archive.
    ///
    /// # Errors
    /// Returns [`CyroidError::Conflict`] if the file already exists or a
    /// download for this key is already in flight.
    pub fn start_download(&self, kind: IsoKind, name: &str, url: &str) -> Result<CacheKey> {
        let key = CacheKey::Iso {
            iso_kind: kind,
            name: name.to_string(),
        };
        let final_path = layout::final_path(&self.config, kind, name);
        if final_path.exists() {
            return Err(CyroidError::conflict(format!(
                "{} already present in cache",
                final_path.display()
            )));
        }

        let status = Arc::new(RwLock::new(CacheStatus::Downloading {
            bytes_done: 0,
            bytes_total: None,
            percent: Some(0.0),
        }));
        let cancelled = Arc::new(AtomicBool::new(false));
        self.reserve_slot(&key, &status, &cancelled)?;

        let http = self.http.clone();
        let url = url.to_string();
        let name = name.to_string();
        let config = Arc::clone(&self.config);
        let status_task = Arc::clone(&status);
        let cancelled_task = Arc::clone(&cancelled);
        let inflight = Arc::clone(&self.inflight);
        let key_string = key.as_string();

        tokio::spawn(async move {
            let result = run_download(
                &http,
                &url,
                &final_path,
                &config,
                kind,
                &name,
                &status_task,
                &cancelled_task,
            )
            .await;
            let outcome = match result {
                Ok(bytes_done) => WorkerOutcome::Completed(bytes_done),
                Err(_) if cancelled_task.load(Ordering::SeqCst) => WorkerOutcome::Cancelled,
                Err(e) => WorkerOutcome::Failed(e),
            };
            finish(&status_task, &inflight, &key_string, outcome).await;
        });

        Ok(key)
    }

    fn reserve_slot(
        &self,
        key: &CacheKey,
        status: &Arc<RwLock<CacheStatus>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<()> {
        let mut guard = self.inflight.lock().expect("inflight mutex poisoned");
        if guard.contains_key(&key.as_string()) {
            return Err(CyroidError::conflict(format!(
                "an operation for {} is already in flight",
                key.as_string()
            )));
        }
        guard.insert(
            key.as_string(),
            InFlight {
                status: Arc::clone(status),
                cancelled: Arc::clone(cancelled),
            },
        );
        Ok(())
    }

    /// Returns the current status for `key`, or [`CacheStatus::NotFound`]
    /// if nothing is in flight and no terminal entry remains in the grace
    /// window.
    pub async fn status(&self, key: &CacheKey) -> CacheStatus {
        let entry = {
            let guard = self.inflight.lock().expect("inflight mutex poisoned");
            guard.get(&key.as_string()).map(|e| Arc::clone(&e.status))
        };
        match entry {
            Some(status) => status.read().await.clone(),
            None => CacheStatus::NotFound,
        }
    }

    /// Sets the cancellation flag for `key`; the worker polls it between
    /// chunks/layers and cleans up partial output.
    pub fn cancel(&self, key: &CacheKey) {
        let guard = self.inflight.lock().expect("inflight mutex poisoned");
        if let Some(entry) = guard.get(&key.as_string()) {
            entry.cancelled.store(true, Ordering::SeqCst);
        }
    }

    /// Lists keys with an in-flight or still-in-grace-window entry.
    #[must_use]
    pub fn list_active(&self) -> Vec<String> {
        let guard = self.inflight.lock().expect("inflight mutex poisoned");
        guard.keys().cloned().collect()
    }

    /// Deletes a completed cache file at its final path, removing the
    /// sidecar metadata entry for custom ISOs.
    ///
    /// # Errors
    /// Returns [`CyroidError::Io`] if the file exists but cannot be removed.
    pub fn delete(&self, kind: IsoKind, name: &str) -> Result<()> {
        let path = layout::final_path(&self.config, kind, name);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| CyroidError::Io {
                path: path.clone(),
                source: e,
            })?;
        }
        if kind == IsoKind::Custom {
            let mut entries = layout::read_custom_metadata(&self.config)?;
            if let Some(file_name) = path.file_name().and_then(|f| f.to_str()) {
                entries.remove(file_name);
            }
            layout::write_custom_metadata(&self.config, &entries)?;
        }
        Ok(())
    }

    /// Looks up the final on-disk file for a completed entry, content-hashed
    /// on demand (the cache never persists a hash; "content hash, when
    /// known" per the `CacheEntry` data model means computable from the
    /// file present on disk, not a cached value).
    ///
    /// # Errors
    /// Returns [`CyroidError::Io`] if the file exists but cannot be read.
    pub fn cached_file(&self, kind: IsoKind, name: &str) -> Result<Option<CachedFile>> {
        let path = layout::final_path(&self.config, kind, name);
        if !path.exists() {
            return Ok(None);
        }
        let size = std::fs::metadata(&path)
            .map_err(|e| CyroidError::Io {
                path: path.clone(),
                source: e,
            })?
            .len();
        let sha256 = hash_file(&path)?;
        Ok(Some(CachedFile {
            path,
            size,
            sha256: Some(sha256),
        }))
    }
}

fn hash_file(path: &std::path::Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(|e| CyroidError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| CyroidError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

async fn finish(
    status: &Arc<RwLock<CacheStatus>>,
    inflight: &Arc<std::sync::Mutex<HashMap<String, InFlight>>>,
    key_string: &str,
    outcome: WorkerOutcome,
) {
    {
        let mut guard = status.write().await;
        *guard = match outcome {
            WorkerOutcome::Completed(bytes_done) => CacheStatus::Completed { bytes_done },
            WorkerOutcome::Cancelled => CacheStatus::Cancelled,
            WorkerOutcome::Failed(e) => CacheStatus::Failed {
                error: e.to_string(),
            },
        };
    }
    tokio::time::sleep(CACHE_TERMINAL_GRACE).await;
    inflight
        .lock()
        .expect("inflight mutex poisoned")
        .remove(key_string);
}

async fn run_pull(
    runtime: &Arc<dyn ContainerRuntime>,
    image: &str,
    status: &Arc<RwLock<CacheStatus>>,
    cancelled: &Arc<AtomicBool>,
) -> WorkerOutcome {
    let mut stream = match runtime.pull_stream(image).await {
        Ok(s) => s,
        Err(e) => return WorkerOutcome::Failed(CyroidError::from(e)),
    };

    let mut layers: HashMap<String, (u64, Option<u64>)> = HashMap::new();
    while let Some(progress) = stream.next().await {
        if cancelled.load(Ordering::SeqCst) {
            return WorkerOutcome::Cancelled;
        }
        match progress {
            PullProgress::Layer {
                layer_id,
                bytes_current,
                bytes_total,
                ..
            } => {
                layers.insert(layer_id, (bytes_current, bytes_total));
                let (done, total) = aggregate(&layers);
                let percent = total.map(|t| {
                    if t == 0 {
                        99.0
                    } else {
                        ((done as f64 / t as f64) * 100.0).min(99.0)
                    }
                });
                let mut guard = status.write().await;
                *guard = CacheStatus::Pulling {
                    bytes_done: done,
                    bytes_total: total,
                    percent,
                };
            }
            PullProgress::Complete => {
                let (done, _) = aggregate(&layers);
                return WorkerOutcome::Completed(done);
            }
            PullProgress::Error { message } => {
                return WorkerOutcome::Failed(CyroidError::transient(message));
            }
        }
    }
    let (done, _) = aggregate(&layers);
    WorkerOutcome::Completed(done)
}

fn aggregate(layers: &HashMap<String, (u64, Option<u64>)>) -> (u64, Option<u64>) {
    let done: u64 = layers.values().map(|(c, _)| c).sum();
    let total = layers
        .values()
        .try_fold(0u64, |acc, (_, t)| t.map(|t| acc + t));
    (done, total)
}

#[allow(clippy::too_many_arguments)]
async fn run_download(
    http: &reqwest::Client,
    url: &str,
    final_path: &std::path::Path,
    config: &CyroidConfig,
    kind: IsoKind,
    name: &str,
    status: &Arc<RwLock<CacheStatus>>,
    cancelled: &Arc<AtomicBool>,
) -> Result<u64> {
    let is_archive = archive::is_archive(url);

    let tmp_dir = final_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&tmp_dir).map_err(|e| CyroidError::Io {
        path: tmp_dir.clone(),
        source: e,
    })?;

    let download_path = tmp_dir.join(format!(".{}.part", uuid::Uuid::new_v4()));
    let bytes_done = stream_to_file(http, url, &download_path, status, cancelled).await?;

    if cancelled.load(Ordering::SeqCst) {
        let _ = std::fs::remove_file(&download_path);
        return Err(CyroidError::conflict("download cancelled"));
    }

    let placed_bytes = if is_archive {
        {
            let mut guard = status.write().await;
            *guard = CacheStatus::Extracting;
        }
        let multiple = archive::extract_largest_iso(&download_path, &tmp_dir, final_path).map_err(|e| {
            let _ = std::fs::remove_file(&download_path);
            e
        })?;
        if multiple {
            warn!(archive = %url, "multiple ISO files found in archive, using largest");
        }
        let _ = std::fs::remove_file(&download_path);
        std::fs::metadata(final_path).map(|m| m.len()).unwrap_or(0)
    } else {
        let size = std::fs::metadata(&download_path).map(|m| m.len()).unwrap_or(0);
        layout::atomic_place(&download_path, final_path)?;
        size
    };

    if kind == IsoKind::Custom {
        let file_name = final_path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(name)
            .to_string();
        layout::upsert_custom_metadata(
            config,
            &file_name,
            CustomIsoMetadata {
                name: name.to_string(),
                url: Some(url.to_string()),
                downloaded_at: chrono::Utc::now(),
                extracted_from_archive: is_archive,
            },
        )?;
    }

    info!(path = %final_path.display(), "cache download completed");
    Ok(placed_bytes)
}

async fn stream_to_file(
    http: &reqwest::Client,
    url: &str,
    dest: &std::path::Path,
    status: &Arc<RwLock<CacheStatus>>,
    cancelled: &Arc<AtomicBool>,
) -> Result<u64> {
    let response = http
        .get(url)
        .timeout(cyroid_common::constants::DOWNLOAD_TIMEOUT)
        .send()
        .await
        .map_err(|e| CyroidError::transient(e.to_string()))?;
    let bytes_total = response.content_length();

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| CyroidError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut stream = response.bytes_stream();
    let mut bytes_done: u64 = 0;
    while let Some(chunk) = stream.next().await {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let chunk = chunk.map_err(|e| CyroidError::transient(e.to_string()))?;
        file.write_all(&chunk).await.map_err(|e| CyroidError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        bytes_done += chunk.len() as u64;

        let percent = bytes_total.map(|t| {
            if t == 0 {
                100.0
            } else {
                (bytes_done as f64 / t as f64) * 100.0
            }
        });
        let mut guard = status.write().await;
        *guard = CacheStatus::Downloading {
            bytes_done,
            bytes_total,
            percent,
        };
    }
    drop(file);

    if cancelled.load(Ordering::SeqCst) {
        let _ = tokio::fs::remove_file(dest).await;
    }

    Ok(bytes_done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_sums_known_totals() {
        let mut layers = HashMap::new();
        layers.insert("a".to_string(), (50, Some(100)));
        layers.insert("b".to_string(), (25, Some(100)));
        let (done, total) = aggregate(&layers);
        assert_eq!(done, 75);
        assert_eq!(total, Some(200));
    }

    #[test]
    fn aggregate_total_unknown_if_any_layer_unknown() {
        let mut layers = HashMap::new();
        layers.insert("a".to_string(), (50, Some(100)));
        layers.insert("b".to_string(), (25, None));
        let (done, total) = aggregate(&layers);
        assert_eq!(done, 75);
        assert_eq!(total, None);
    }

    #[test]
    fn cache_key_as_string_is_stable() {
        let a = CacheKey::Image {
            image: "nginx:alpine".to_string(),
        };
        let b = CacheKey::Image {
            image: "nginx:alpine".to_string(),
        };
        assert_eq!(a.as_string(), b.as_string());
    }
}
