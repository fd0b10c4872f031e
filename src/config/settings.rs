//! User settings for waydroid-backup
//!
//! Holds the backup root, the retention limit, where Waydroid keeps the data
//! being backed up, and which services must be quiesced around copies.
//! Settings are loaded once and then passed by reference; nothing mutates
//! them while an operation runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::{home_dir, BackupPaths};
use crate::error::BackupError;
use crate::service::ManagedService;

/// Which service controller to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceManagerKind {
    /// Control units through `systemctl` (default)
    #[default]
    Systemd,
    /// Do not touch services at all
    None,
}

/// Locations of the data that goes into a backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePaths {
    /// Waydroid state directory holding `waydroid.cfg`, `lxc/` and `images/`
    #[serde(default = "default_waydroid_state_dir")]
    pub waydroid_state_dir: PathBuf,

    /// Directory containing the Android user-data directory `data/`
    #[serde(default = "default_user_data_parent")]
    pub user_data_parent: PathBuf,

    /// wayvnc configuration directory
    #[serde(default = "default_wayvnc_config_dir")]
    pub wayvnc_config_dir: PathBuf,

    /// File holding the VNC password
    #[serde(default = "default_vnc_password_file")]
    pub vnc_password_file: PathBuf,
}

impl SourcePaths {
    /// The Android user-data directory
    pub fn user_data_dir(&self) -> PathBuf {
        self.user_data_parent.join(crate::backup::USERDATA_PREFIX)
    }

    /// The system images directory
    pub fn images_dir(&self) -> PathBuf {
        self.waydroid_state_dir.join(crate::backup::IMAGES_PREFIX)
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            waydroid_state_dir: default_waydroid_state_dir(),
            user_data_parent: default_user_data_parent(),
            wayvnc_config_dir: default_wayvnc_config_dir(),
            vnc_password_file: default_vnc_password_file(),
        }
    }
}

/// Service quiescing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Controller implementation
    #[serde(default)]
    pub manager: ServiceManagerKind,

    /// Services stopped around copies, in stop order
    #[serde(default = "default_managed_services")]
    pub managed: Vec<ManagedService>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            manager: ServiceManagerKind::default(),
            managed: default_managed_services(),
        }
    }
}

/// Settings for waydroid-backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory holding one sub-directory per backup
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,

    /// Number of complete backups kept by `clean`
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Where the backed-up data lives
    #[serde(default)]
    pub sources: SourcePaths,

    /// Service quiescing
    #[serde(default)]
    pub services: ServiceSettings,

    /// Command used to query the Waydroid version
    #[serde(default = "default_waydroid_binary")]
    pub waydroid_binary: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("/var/backups/waydroid")
}

fn default_max_backups() -> usize {
    5
}

fn default_waydroid_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/waydroid")
}

fn default_user_data_parent() -> PathBuf {
    home_dir().join(".local/share/waydroid")
}

fn default_wayvnc_config_dir() -> PathBuf {
    home_dir().join(".config/wayvnc")
}

fn default_vnc_password_file() -> PathBuf {
    home_dir().join("vnc-password.txt")
}

fn default_managed_services() -> Vec<ManagedService> {
    vec![ManagedService::WayVnc, ManagedService::WaydroidContainer]
}

fn default_waydroid_binary() -> String {
    "waydroid".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_root: default_backup_root(),
            max_backups: default_max_backups(),
            sources: SourcePaths::default(),
            services: ServiceSettings::default(),
            waydroid_binary: default_waydroid_binary(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or use defaults if the file doesn't exist
    pub fn load_or_create(paths: &BackupPaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| BackupError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            settings.validate()?;
            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &BackupPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| BackupError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Return a copy with a different backup root
    pub fn with_backup_root(mut self, root: PathBuf) -> Self {
        self.backup_root = root;
        self
    }

    /// Reject settings no operation could work with
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.backup_root.as_os_str().is_empty() {
            return Err(BackupError::Config("backup_root must not be empty".into()));
        }
        if !self.backup_root.is_absolute() {
            return Err(BackupError::Config(format!(
                "backup_root must be an absolute path: {}",
                self.backup_root.display()
            )));
        }
        if self.waydroid_binary.trim().is_empty() {
            return Err(BackupError::Config("waydroid_binary must not be empty".into()));
        }
        Ok(())
    }
}
