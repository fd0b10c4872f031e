//! Backup manifest
//!
//! `manifest.json` is written once, before any other member, and never
//! touched again. Field names and order are part of the on-disk format.

use std::fmt;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::name::BackupName;
use crate::error::BackupResult;
use crate::storage::{read_json_required, write_json_atomic};

/// What a backup contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    /// Configuration and user data
    #[default]
    DataOnly,
    /// Everything in `DataOnly` plus the system images
    Full,
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::DataOnly => write!(f, "data-only"),
            BackupKind::Full => write!(f, "full"),
        }
    }
}

/// Per-backup manifest record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub backup_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub hostname: String,
    pub waydroid_version: String,
}

impl Manifest {
    pub fn new(
        name: &BackupName,
        kind: BackupKind,
        hostname: impl Into<String>,
        waydroid_version: impl Into<String>,
    ) -> Self {
        Self {
            backup_name: name.as_str().to_string(),
            timestamp: name.created_at(),
            kind,
            hostname: hostname.into(),
            waydroid_version: waydroid_version.into(),
        }
    }

    /// Read a manifest file
    pub fn read(path: &Path) -> BackupResult<Self> {
        read_json_required(path)
    }

    /// Write a manifest file atomically
    pub fn write(&self, path: &Path) -> BackupResult<()> {
        write_json_atomic(path, self)
    }
}

/// Host name recorded in new manifests
pub fn detect_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// Version reported by `<binary> --version`, or "unknown"
pub fn detect_waydroid_version(binary: &str) -> String {
    let output = match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(status = %output.status, "waydroid --version failed");
            return "unknown".to_string();
        }
        Err(e) => {
            tracing::debug!(error = %e, "Could not run {}", binary);
            return "unknown".to_string();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}
