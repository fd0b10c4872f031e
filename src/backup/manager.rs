//! Backup manager for waydroid-backup
//!
//! Creates backups under the configured root, enumerates them and enforces
//! the retention limit.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::manifest::{detect_hostname, detect_waydroid_version, BackupKind, Manifest};
use super::name::BackupName;
use super::{
    Component, CONFIG_DIR, CONFIG_ENTRIES, IMAGES_ARCHIVE, IMAGES_PREFIX, MANIFEST_FILE,
    PASSWORD_FILE, SIZE_FILE, USERDATA_ARCHIVE, USERDATA_PREFIX, WAYVNC_DIR,
};
use crate::archive::pack_dir;
use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::config::settings::Settings;
use crate::error::{BackupError, BackupResult};
use crate::service::{QuiescedServices, ServiceController};
use crate::storage::{copy_tree, dir_size, format_size};

/// Identifies a backup on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub name: BackupName,
    pub path: PathBuf,
}

/// Whether every member of a backup was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    /// Manifest and size marker present
    Complete,
    /// Creation did not finish (or the manifest is unreadable)
    Incomplete,
}

/// What `list` reports about one backup directory
#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub name: BackupName,
    pub path: PathBuf,
    pub status: BackupStatus,
    /// None when missing or unreadable
    pub manifest: Option<Manifest>,
    /// Contents of `size.txt`
    pub size: Option<String>,
    /// Optional members present on disk
    pub components: Vec<Component>,
}

impl BackupSummary {
    pub fn is_complete(&self) -> bool {
        self.status == BackupStatus::Complete
    }

    /// "data-only", "full" or "unknown"
    pub fn kind_label(&self) -> String {
        self.manifest
            .as_ref()
            .map(|m| m.kind.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Manifest timestamp, or "unknown"
    pub fn date_label(&self) -> String {
        self.manifest
            .as_ref()
            .map(|m| m.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Recorded size, or "unknown"
    pub fn size_label(&self) -> &str {
        self.size.as_deref().unwrap_or("unknown")
    }

    /// Creation time encoded in the name
    pub fn created_at(&self) -> DateTime<Utc> {
        self.name.created_at()
    }

    fn handle(&self) -> BackupHandle {
        BackupHandle {
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// Manages backup creation and retention
///
/// Operations are not locked against each other; callers must not run two
/// of them against the same root at once.
pub struct BackupManager<'a> {
    pub(super) settings: &'a Settings,
    pub(super) services: &'a dyn ServiceController,
    pub(super) audit: Option<&'a AuditLogger>,
}

impl<'a> BackupManager<'a> {
    /// Create a new BackupManager
    pub fn new(settings: &'a Settings, services: &'a dyn ServiceController) -> Self {
        Self {
            settings,
            services,
            audit: None,
        }
    }

    /// Record lifecycle operations in `audit`
    pub fn with_audit(mut self, audit: &'a AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Directory holding all backups
    pub fn backup_root(&self) -> &Path {
        &self.settings.backup_root
    }

    /// Create a new backup
    ///
    /// The directory is created with a fresh name, the manifest is written
    /// first and `size.txt` last. If a required member fails the directory
    /// stays on disk without `size.txt` and is reported as incomplete.
    pub fn create(&self, kind: BackupKind) -> BackupResult<BackupHandle> {
        let root = self.backup_root();
        fs::create_dir_all(root).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create backup root {}: {}",
                root.display(),
                e
            ))
        })?;

        let name = BackupName::now();
        let path = root.join(name.as_str());
        // Not create_dir_all: a same-second collision must fail, not merge
        fs::create_dir(&path).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create backup directory {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(backup = %name, kind = %kind, "Creating backup");

        match self.populate(&name, &path, kind) {
            Ok(size) => {
                tracing::info!(backup = %name, size = %size, "Backup complete");
                self.record(AuditEntry::success(Operation::Create, name.as_str()).with_detail(
                    format!("{} backup, {}", kind, size),
                ));
                Ok(BackupHandle { name, path })
            }
            Err(e) => {
                tracing::error!(backup = %name, error = %e, "Backup failed, leaving it incomplete");
                self.record(AuditEntry::failed(Operation::Create, name.as_str(), &e));
                Err(e)
            }
        }
    }

    fn populate(&self, name: &BackupName, dir: &Path, kind: BackupKind) -> BackupResult<String> {
        let manifest = Manifest::new(
            name,
            kind,
            detect_hostname(),
            detect_waydroid_version(&self.settings.waydroid_binary),
        );
        manifest.write(&dir.join(MANIFEST_FILE))?;

        let guard = QuiescedServices::acquire(self.services, &self.settings.services.managed)?;
        self.copy_members(dir, kind)?;
        for failure in guard.release() {
            tracing::warn!(error = %failure, "Service did not come back after backup");
        }

        let size = format_size(dir_size(dir)?);
        fs::write(dir.join(SIZE_FILE), format!("{}\n", size))
            .map_err(|e| BackupError::Io(format!("Failed to write {}: {}", SIZE_FILE, e)))?;

        Ok(size)
    }

    fn copy_members(&self, dir: &Path, kind: BackupKind) -> BackupResult<()> {
        let sources = &self.settings.sources;

        tracing::info!("Copying Waydroid configuration");
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir)?;
        let mut copied = 0;
        for entry in CONFIG_ENTRIES {
            let src = sources.waydroid_state_dir.join(entry);
            if src.is_dir() {
                copy_tree(&src, &config_dir.join(entry))?;
            } else if src.is_file() {
                fs::copy(&src, config_dir.join(entry))?;
            } else {
                continue;
            }
            copied += 1;
        }
        if copied == 0 {
            tracing::warn!(
                dir = %sources.waydroid_state_dir.display(),
                "No Waydroid configuration found"
            );
        }

        if sources.wayvnc_config_dir.is_dir() {
            tracing::info!("Copying wayvnc configuration");
            copy_tree(&sources.wayvnc_config_dir, &dir.join(WAYVNC_DIR))?;
        }

        if sources.vnc_password_file.is_file() {
            fs::copy(&sources.vnc_password_file, dir.join(PASSWORD_FILE))?;
        }

        let user_data = sources.user_data_dir();
        if !user_data.is_dir() {
            return Err(BackupError::file_not_found(format!(
                "user data directory {}",
                user_data.display()
            )));
        }
        tracing::info!(src = %user_data.display(), "Archiving user data");
        pack_dir(&user_data, USERDATA_PREFIX, &dir.join(USERDATA_ARCHIVE))?;

        if kind == BackupKind::Full {
            let images = sources.images_dir();
            if !images.is_dir() {
                return Err(BackupError::file_not_found(format!(
                    "images directory {}",
                    images.display()
                )));
            }
            tracing::info!(src = %images.display(), "Archiving system images");
            pack_dir(&images, IMAGES_PREFIX, &dir.join(IMAGES_ARCHIVE))?;
        }

        Ok(())
    }

    /// List every directory under the root whose name is a backup name
    ///
    /// Sorted by name, which is chronological. Each call rescans the root.
    pub fn list(&self) -> BackupResult<Vec<BackupSummary>> {
        let root = self.backup_root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(root)
            .map_err(|e| BackupError::Io(format!("Failed to read backup directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| BackupError::Io(format!("Failed to read directory entry: {}", e)))?;

            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().and_then(|n| BackupName::parse(n).ok())
            else {
                continue;
            };

            backups.push(summarize(name, entry.path()));
        }

        backups.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(backups)
    }

    /// Look up one backup by name
    pub fn get(&self, name: &str) -> BackupResult<BackupSummary> {
        let name = BackupName::parse(name)?;
        let path = self.backup_root().join(name.as_str());
        if !path.is_dir() {
            return Err(BackupError::backup_not_found(name.as_str()));
        }
        Ok(summarize(name, path))
    }

    /// Remove the oldest complete backups so at most `max_keep` remain
    ///
    /// Incomplete backups are neither counted nor removed.
    pub fn clean(&self, max_keep: usize) -> BackupResult<Vec<BackupHandle>> {
        let mut complete: Vec<BackupSummary> =
            self.list()?.into_iter().filter(|b| b.is_complete()).collect();
        complete.sort_by_key(|b| b.created_at());

        let excess = complete.len().saturating_sub(max_keep);
        let mut removed = Vec::new();

        for backup in complete.into_iter().take(excess) {
            tracing::info!(backup = %backup.name, "Removing old backup");
            if let Err(e) = fs::remove_dir_all(&backup.path) {
                let err = BackupError::Io(format!(
                    "Failed to delete old backup {}: {}",
                    backup.name, e
                ));
                self.record(AuditEntry::failed(Operation::Clean, backup.name.as_str(), &err));
                return Err(err);
            }
            self.record(AuditEntry::success(Operation::Clean, backup.name.as_str()));
            removed.push(backup.handle());
        }

        Ok(removed)
    }

    /// Delete one backup, complete or not
    pub fn delete(&self, name: &str) -> BackupResult<BackupHandle> {
        let backup = self.get(name)?;

        fs::remove_dir_all(&backup.path).map_err(|e| {
            BackupError::Io(format!("Failed to delete backup {}: {}", backup.name, e))
        })?;

        tracing::info!(backup = %backup.name, "Backup deleted");
        self.record(AuditEntry::success(Operation::Delete, backup.name.as_str()));
        Ok(backup.handle())
    }

    pub(super) fn record(&self, entry: AuditEntry) {
        if let Some(audit) = self.audit {
            if let Err(e) = audit.log(&entry) {
                tracing::warn!(error = %e, "Failed to write audit entry");
            }
        }
    }
}

fn summarize(name: BackupName, path: PathBuf) -> BackupSummary {
    let manifest_path = path.join(MANIFEST_FILE);
    let manifest = if manifest_path.exists() {
        match Manifest::read(&manifest_path) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(backup = %name, error = %e, "Unreadable manifest");
                None
            }
        }
    } else {
        None
    };

    let size = fs::read_to_string(path.join(SIZE_FILE))
        .ok()
        .map(|s| s.trim().to_string());

    let status = if manifest.is_some() && size.is_some() {
        BackupStatus::Complete
    } else {
        BackupStatus::Incomplete
    };

    let components = Component::ALL
        .into_iter()
        .filter(|c| path.join(c.file_name()).exists())
        .collect();

    BackupSummary {
        name,
        path,
        status,
        manifest,
        size,
        components,
    }
}
