//! Export and import of single backups as portable archives
//!
//! An exported backup is `<name>.tar.gz` with every member under `<name>/`.
//! Imports are validated before anything is written to the backup root.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::manager::{BackupHandle, BackupManager};
use super::manifest::Manifest;
use super::name::BackupName;
use super::MANIFEST_FILE;
use crate::archive::{pack_dir, unpack, validate};
use crate::audit::{AuditEntry, Operation};
use crate::error::{BackupError, BackupResult};

impl<'a> BackupManager<'a> {
    /// Export a backup to `<out_dir>/<name>.tar.gz`
    pub fn export(&self, name: &str, out_dir: &Path) -> BackupResult<PathBuf> {
        let backup = self.get(name)?;
        if !backup.is_complete() {
            tracing::warn!(backup = %backup.name, "Exporting an incomplete backup");
        }

        fs::create_dir_all(out_dir).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create output directory {}: {}",
                out_dir.display(),
                e
            ))
        })?;
        let dest = out_dir.join(format!("{}.tar.gz", backup.name));

        match pack_dir(&backup.path, backup.name.as_str(), &dest) {
            Ok(members) => {
                tracing::info!(
                    backup = %backup.name,
                    dest = %dest.display(),
                    members,
                    "Backup exported"
                );
                self.record(
                    AuditEntry::success(Operation::Export, backup.name.as_str())
                        .with_detail(dest.display().to_string()),
                );
                Ok(dest)
            }
            Err(e) => {
                self.record(AuditEntry::failed(Operation::Export, backup.name.as_str(), &e));
                Err(e)
            }
        }
    }

    /// Import an exported backup into the backup root
    ///
    /// The archive must hold exactly one top-level directory named like a
    /// backup, every member must be safe, and its manifest must name the same
    /// backup. An existing backup of that name is never overwritten.
    pub fn import(&self, archive: &Path) -> BackupResult<BackupHandle> {
        let label = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.display().to_string());

        match self.import_archive(archive) {
            Ok(handle) => {
                tracing::info!(backup = %handle.name, "Backup imported");
                self.record(
                    AuditEntry::success(Operation::Import, handle.name.as_str())
                        .with_detail(archive.display().to_string()),
                );
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(archive = %archive.display(), error = %e, "Import failed");
                self.record(AuditEntry::failed(Operation::Import, label, &e));
                Err(e)
            }
        }
    }

    fn import_archive(&self, archive: &Path) -> BackupResult<BackupHandle> {
        if !archive.is_file() {
            return Err(BackupError::file_not_found(archive.display().to_string()));
        }

        let report = validate(archive, None).map_err(|r| r.into_error(archive))?;
        let top_level: Vec<&String> = report.top_level.iter().collect();
        let name = match top_level.as_slice() {
            [only] => BackupName::parse(only).map_err(|e| {
                BackupError::Validation(format!(
                    "{} does not contain a backup: {}",
                    archive.display(),
                    e
                ))
            })?,
            _ => {
                return Err(BackupError::Validation(format!(
                    "{} must contain exactly one top-level directory, found {}",
                    archive.display(),
                    top_level.len()
                )))
            }
        };
        validate(archive, Some(name.as_str())).map_err(|r| r.into_error(archive))?;

        let root = self.backup_root();
        let target = root.join(name.as_str());
        if fs::symlink_metadata(&target).is_ok() {
            return Err(BackupError::backup_exists(name.as_str()));
        }

        fs::create_dir_all(root).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create backup root {}: {}",
                root.display(),
                e
            ))
        })?;
        let staging = tempfile::Builder::new()
            .prefix(".waydroid-import-")
            .tempdir_in(root)
            .map_err(|e| BackupError::Io(format!("Failed to create staging directory: {}", e)))?;

        unpack(archive, staging.path())?;

        let staged = staging.path().join(name.as_str());
        reject_links_and_special_files(archive, &staged)?;
        let manifest = Manifest::read(&staged.join(MANIFEST_FILE)).map_err(|e| {
            BackupError::Validation(format!(
                "{} has no readable manifest: {}",
                archive.display(),
                e
            ))
        })?;
        if manifest.backup_name != name.as_str() {
            return Err(BackupError::Validation(format!(
                "manifest names {:?} but the archive holds {}",
                manifest.backup_name, name
            )));
        }

        fs::rename(&staged, &target).map_err(|e| {
            BackupError::Io(format!(
                "Failed to move imported backup into {}: {}",
                target.display(),
                e
            ))
        })?;

        Ok(BackupHandle { name, path: target })
    }
}

/// Imported backups may only hold regular files and directories
fn reject_links_and_special_files(archive: &Path, staged: &Path) -> BackupResult<()> {
    for entry in WalkDir::new(staged).follow_links(false) {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() || file_type.is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(staged).unwrap_or(entry.path());
        let what = if file_type.is_symlink() {
            "symlink"
        } else {
            "special file"
        };
        return Err(BackupError::Validation(format!(
            "{} contains a {}: {}",
            archive.display(),
            what,
            rel.display()
        )));
    }
    Ok(())
}
