//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't leave half-written files behind,
//! plus the tree copy and size helpers used when assembling a backup.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use walkdir::WalkDir;

use crate::error::BackupError;

/// Read JSON from a file, returning an error if the file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, BackupError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(BackupError::file_not_found(path.display().to_string()));
    }

    let file = File::open(path)
        .map_err(|e| BackupError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| BackupError::Json(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not present at all.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), BackupError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target, so the rename stays on one filesystem
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| BackupError::Io(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| BackupError::Json(format!("Failed to serialize data: {}", e)))?;
    writer.write_all(b"\n")?;

    writer
        .flush()
        .map_err(|e| BackupError::Io(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| BackupError::Io(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        BackupError::Io(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Recursively copy `src` into `dst`, overwriting files that already exist
///
/// Symlinks are recreated as symlinks rather than followed. Returns the
/// number of regular files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64, BackupError> {
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BackupError::Io(format!("Failed to relativize path: {}", e)))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                BackupError::Io(format!("Failed to create {}: {}", target.display(), e))
            })?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).map_err(|e| {
                BackupError::Io(format!(
                    "Failed to copy {} to {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                ))
            })?;
            copied += 1;
        } else {
            tracing::warn!(path = %entry.path().display(), "Skipping special file");
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<(), BackupError> {
    let link = fs::read_link(src)?;
    if fs::symlink_metadata(dst).is_ok() {
        remove_path(dst)?;
    }
    std::os::unix::fs::symlink(&link, dst).map_err(|e| {
        BackupError::Io(format!("Failed to create symlink {}: {}", dst.display(), e))
    })
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> Result<(), BackupError> {
    tracing::warn!(path = %src.display(), "Skipping symlink on this platform");
    Ok(())
}

/// Remove a file, symlink or directory tree without following symlinks
pub fn remove_path(path: &Path) -> Result<(), BackupError> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .map_err(|e| BackupError::Io(format!("Failed to remove {}: {}", path.display(), e)))
}

/// Total apparent size in bytes of all regular files under `path`
pub fn dir_size(path: &Path) -> Result<u64, BackupError> {
    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Format a byte count the way `du -h` does ("512", "4.0K", "1.2G")
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["K", "M", "G", "T", "P"];

    if bytes < 1024 {
        return bytes.to_string();
    }

    let mut value = bytes as f64;
    let mut unit = "";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }

    if value < 10.0 {
        // du rounds up and keeps one decimal below 10
        let rounded = (value * 10.0).ceil() / 10.0;
        if rounded < 10.0 {
            return format!("{:.1}{}", rounded, unit);
        }
        return format!("{}{}", rounded.ceil() as u64, unit);
    }
    format!("{}{}", value.ceil() as u64, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        value: i32,
    }

    #[test]
    fn test_write_and_read_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("sample.json");

        let data = Sample {
            name: "test".into(),
            value: 42,
        };
        write_json_atomic(&path, &data).unwrap();

        let loaded: Sample = read_json_required(&path).unwrap();
        assert_eq!(loaded, data);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_json_required::<Sample, _>(temp_dir.path().join("missing.json"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_copy_tree_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("lxc").join("waydroid")).unwrap();
        fs::write(src.join("waydroid.cfg"), "[waydroid]\n").unwrap();
        fs::write(src.join("lxc").join("waydroid").join("config"), "lxc.uts.name").unwrap();

        let dst = temp_dir.path().join("dst");
        let copied = copy_tree(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("lxc/waydroid/config")).unwrap(),
            "lxc.uts.name"
        );
        assert_eq!(dir_size(&dst).unwrap(), 11 + 12);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_keeps_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", src.join("link")).unwrap();

        let dst = temp_dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert_eq!(
            fs::read_link(dst.join("link")).unwrap(),
            std::path::PathBuf::from("/nonexistent/target")
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(1024), "1.0K");
        assert_eq!(format_size(1536), "1.5K");
        assert_eq!(format_size(10 * 1024), "10K");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0M");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0G");
    }
}
