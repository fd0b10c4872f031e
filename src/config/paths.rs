//! Path management for waydroid-backup
//!
//! Resolves where the tool keeps its own settings and audit log. The backup
//! root itself lives in [`Settings`](super::settings::Settings).
//!
//! ## Path Resolution Order
//!
//! 1. `WAYDROID_BACKUP_CONFIG_DIR` environment variable (if set)
//! 2. The platform config directory (`$XDG_CONFIG_HOME` or `~/.config`)
//!    joined with `waydroid-backup`

use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::BackupError;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "WAYDROID_BACKUP_CONFIG_DIR";

/// Manages the paths used by waydroid-backup itself
#[derive(Debug, Clone)]
pub struct BackupPaths {
    /// Directory holding config.json and audit.log
    config_dir: PathBuf,
}

impl BackupPaths {
    /// Create a new BackupPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined and no
    /// override is set.
    pub fn new() -> Result<Self, BackupError> {
        let config_dir = if let Ok(custom) = std::env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            let base = BaseDirs::new().ok_or_else(|| {
                BackupError::Config("Could not determine home directory".into())
            })?;
            base.config_dir().join("waydroid-backup")
        };

        Ok(Self { config_dir })
    }

    /// Create BackupPaths with a custom config directory (useful for testing)
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.config_dir.join("audit.log")
    }

    /// Ensure the config directory exists
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.config_dir)
            .map_err(|e| BackupError::Io(format!("Failed to create config directory: {}", e)))
    }
}

/// The invoking user's home directory, falling back to `/root`
///
/// Waydroid in an LXC guest normally runs as root.
pub fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/root"))
}
