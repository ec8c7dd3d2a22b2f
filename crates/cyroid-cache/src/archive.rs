//! Archive extension detection and ISO extraction policy (§4.2, §8's
//! "Archive extraction" property).

use std::path::{Path, PathBuf};

use cyroid_common::constants::ARCHIVE_EXTENSIONS;
use cyroid_common::error::{CyroidError, Result};

/// Whether `path_or_url` ends in one of the recognized archive extensions.
#[must_use]
pub fn is_archive(path_or_url: &str) -> bool {
    extension_of(path_or_url).is_some()
}

/// Returns the matched archive extension, longest match first so compound
/// extensions like `.tar.gz` are preferred over their final segment.
#[must_use]
pub fn extension_of(path_or_url: &str) -> Option<&'static str> {
    let lower = path_or_url.to_ascii_lowercase();
    let lower = lower.split('?').next().unwrap_or(&lower);
    ARCHIVE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .copied()
}

/// Extracts `archive_path` into a fresh scratch directory under `dest_dir`,
/// finds every `.iso` member, atomically places the largest one at
/// `final_path`, and removes the archive's scratch directory. Returns
/// whether more than one `.iso` was found (callers journal a warning when
/// true, per §4.2).
///
/// Gzipped and plain tarballs (`.tar`, `.tar.gz`, `.tgz`) are unpacked
/// in-process with the `tar`/`flate2` crates. Every other recognized
/// format (`.zip .7z .rar .tar.bz2 .tbz2 .tar.xz .txz .bz2 .xz .lzma`)
/// shells out to the system `7z` binary, mirroring the reference
/// implementation's reliance on it to cover formats this workspace has no
/// native decoder for.
///
/// The scratch directory is a plain (non-auto-deleting) directory managed
/// by hand, not a [`tempfile::TempDir`]: the largest `.iso` is moved out of
/// it before it's removed, and a `TempDir` guard would delete the whole
/// tree — including that file — the instant this function returned it.
///
/// # Errors
/// Returns [`CyroidError::Unrecoverable`] if extraction requires `7z` and
/// it is not installed, the extraction process fails, or no `.iso` member
/// is found. The scratch directory is removed on every exit path, success
/// or failure.
pub fn extract_largest_iso(archive_path: &Path, dest_dir: &Path, final_path: &Path) -> Result<bool> {
    let scratch = dest_dir.join(format!("cyroid-iso-extract-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&scratch).map_err(|e| CyroidError::Io {
        path: scratch.clone(),
        source: e,
    })?;

    let result = extract_into(archive_path, &scratch).and_then(|()| place_largest_iso(&scratch, final_path));
    let _ = std::fs::remove_dir_all(&scratch);
    result
}

fn extract_into(archive_path: &Path, scratch: &Path) -> Result<()> {
    let lower = archive_path.to_string_lossy().to_ascii_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        extract_tar_gz(archive_path, scratch)
    } else if lower.ends_with(".tar") {
        extract_tar(archive_path, scratch)
    } else {
        extract_with_7z(archive_path, scratch)
    }
}

fn extract_tar_gz(archive_path: &Path, scratch: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| CyroidError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let decoder = flate2::read::GzDecoder::new(file);
    tar::Archive::new(decoder)
        .unpack(scratch)
        .map_err(|e| CyroidError::unrecoverable(format!("tar.gz extraction failed: {e}")))
}

fn extract_tar(archive_path: &Path, scratch: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| CyroidError::Io {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    tar::Archive::new(file)
        .unpack(scratch)
        .map_err(|e| CyroidError::unrecoverable(format!("tar extraction failed: {e}")))
}

fn extract_with_7z(archive_path: &Path, scratch: &Path) -> Result<()> {
    let seven_zip = which::which("7z")
        .map_err(|_| CyroidError::unrecoverable("7z is not installed on this host"))?;

    let output = std::process::Command::new(&seven_zip)
        .arg("x")
        .arg("-y")
        .arg(format!("-o{}", scratch.display()))
        .arg(archive_path)
        .output()
        .map_err(|e| CyroidError::unrecoverable(format!("failed to spawn 7z: {e}")))?;

    if !output.status.success() {
        return Err(CyroidError::unrecoverable(format!(
            "archive extraction failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

fn place_largest_iso(scratch: &Path, final_path: &Path) -> Result<bool> {
    let mut isos = find_iso_files(scratch)?;
    if isos.is_empty() {
        return Err(CyroidError::unrecoverable(
            "no .iso file found in archive".to_string(),
        ));
    }

    isos.sort_by_key(|(_, size)| std::cmp::Reverse(*size));
    let multiple = isos.len() > 1;
    let (largest, _) = isos.into_iter().next().expect("checked non-empty above");
    crate::layout::atomic_place(&largest, final_path)?;
    Ok(multiple)
}

fn find_iso_files(root: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| CyroidError::Io {
            path: dir.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| CyroidError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_iso = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("iso"));
            if is_iso {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                found.push((path, size));
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_compound_extensions() {
        assert!(is_archive("custom.tar.gz"));
        assert!(is_archive("https://example.com/iso-bundle.7z"));
        assert!(is_archive("image.tgz"));
        assert!(!is_archive("plain.iso"));
    }

    #[test]
    fn extension_of_prefers_longest_match() {
        assert_eq!(extension_of("foo.tar.gz"), Some(".tar.gz"));
    }

    #[test]
    fn extension_of_none_for_non_archive() {
        assert_eq!(extension_of("windows-11.iso"), None);
    }

    #[test]
    fn extracts_largest_iso_from_tar_gz() {
        let tmp = tempfile::tempdir().unwrap();
        let archive_path = tmp.path().join("bundle.tar.gz");

        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
            let mut builder = tar::Builder::new(encoder);
            append_fake_file(&mut builder, "small.iso", 16);
            append_fake_file(&mut builder, "nested/large.iso", 256);
            append_fake_file(&mut builder, "readme.txt", 8);
            builder.into_inner().unwrap().finish().unwrap();
        }

        let final_path = tmp.path().join("placed.iso");
        let multiple = extract_largest_iso(&archive_path, tmp.path(), &final_path).unwrap();

        assert!(multiple);
        assert_eq!(std::fs::metadata(&final_path).unwrap().len(), 256);
        assert!(!final_path
            .parent()
            .unwrap()
            .read_dir()
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("cyroid-iso-extract-")));
    }

    fn append_fake_file<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, size: usize) {
        let data = vec![0u8; size];
        let mut header = tar::Header::new_gnu();
        header.set_size(size as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
}
