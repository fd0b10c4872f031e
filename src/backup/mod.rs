//! Backup lifecycle for waydroid-backup
//!
//! Creates, lists, prunes, restores, exports and imports Waydroid backups.
//!
//! # Architecture
//!
//! - `BackupManager`: create/list/clean/delete, plus export/import
//! - `RestoreManager`: validated, quiesced restore of a stored backup
//! - `BackupName`, `Manifest`: identity and metadata of one backup
//!
//! # Backup Format
//!
//! Each backup is a directory under the backup root:
//!
//! ```text
//! <root>/waydroid-backup-YYYYMMDD-HHMMSS/
//!     manifest.json       written first
//!     config/             Waydroid configuration files
//!     wayvnc/             optional
//!     vnc-password.txt    optional
//!     userdata.tar.gz     members under data/
//!     images.tar.gz       full backups only, members under images/
//!     size.txt            written last; marks the backup complete
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use waydroid_backup::backup::{BackupKind, BackupManager, RestoreManager};
//!
//! let services = controller_for(&settings);
//! let manager = BackupManager::new(&settings, services.as_ref());
//! let handle = manager.create(BackupKind::DataOnly)?;
//! manager.clean(settings.max_backups)?;
//!
//! let restore = RestoreManager::new(&settings, services.as_ref());
//! restore.restore(handle.name.as_str(), true)?;
//! ```

mod manager;
mod manifest;
mod name;
mod restore;
mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;

pub use manager::{BackupHandle, BackupManager, BackupStatus, BackupSummary};
pub use manifest::{detect_hostname, detect_waydroid_version, BackupKind, Manifest};
pub use name::{BackupName, NAME_PREFIX};
pub use restore::{RestoreManager, RestoreOutcome, RestorePhase, RestoreReport};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIZE_FILE: &str = "size.txt";
pub const USERDATA_ARCHIVE: &str = "userdata.tar.gz";
pub const IMAGES_ARCHIVE: &str = "images.tar.gz";
pub const CONFIG_DIR: &str = "config";
pub const WAYVNC_DIR: &str = "wayvnc";
pub const PASSWORD_FILE: &str = "vnc-password.txt";

/// Top-level directory inside `userdata.tar.gz`
pub const USERDATA_PREFIX: &str = "data";
/// Top-level directory inside `images.tar.gz`
pub const IMAGES_PREFIX: &str = "images";

/// Waydroid configuration entries copied into `config/`
pub const CONFIG_ENTRIES: [&str; 4] = ["waydroid.cfg", "waydroid_base.prop", "waydroid.prop", "lxc"];

/// Optional parts of a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Config,
    WayVnc,
    Password,
    UserData,
    Images,
}

impl Component {
    /// All components, in restore order
    pub const ALL: [Component; 5] = [
        Component::Config,
        Component::WayVnc,
        Component::Password,
        Component::UserData,
        Component::Images,
    ];

    /// File or directory name inside the backup directory
    pub fn file_name(self) -> &'static str {
        match self {
            Component::Config => CONFIG_DIR,
            Component::WayVnc => WAYVNC_DIR,
            Component::Password => PASSWORD_FILE,
            Component::UserData => USERDATA_ARCHIVE,
            Component::Images => IMAGES_ARCHIVE,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Config => write!(f, "config"),
            Component::WayVnc => write!(f, "wayvnc"),
            Component::Password => write!(f, "password"),
            Component::UserData => write!(f, "userdata"),
            Component::Images => write!(f, "images"),
        }
    }
}
