//! Fixtures shared by the backup unit tests

use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use super::{BackupKind, BackupName, Manifest, MANIFEST_FILE, SIZE_FILE};
use crate::config::settings::{ServiceManagerKind, Settings, SourcePaths};

/// A throwaway Waydroid installation and backup root
pub struct TestEnv {
    pub temp: TempDir,
    pub settings: Settings,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let base = temp.path();

        let state = base.join("var-lib-waydroid");
        fs::create_dir_all(state.join("lxc").join("waydroid")).unwrap();
        fs::create_dir_all(state.join("images")).unwrap();
        fs::write(state.join("waydroid.cfg"), "[waydroid]\narch = x86_64\n").unwrap();
        fs::write(state.join("waydroid_base.prop"), "ro.hardware.gralloc=default\n").unwrap();
        fs::write(state.join("lxc/waydroid/config"), "lxc.uts.name = waydroid\n").unwrap();
        fs::write(state.join("images/system.img"), vec![0u8; 4096]).unwrap();
        fs::write(state.join("images/vendor.img"), vec![1u8; 2048]).unwrap();

        let share = base.join("share-waydroid");
        let data = share.join("data");
        fs::create_dir_all(data.join("system")).unwrap();
        fs::create_dir_all(data.join("media/0/DCIM")).unwrap();
        fs::write(data.join("system/packages.xml"), "<packages/>").unwrap();
        fs::write(data.join("media/0/DCIM/photo.jpg"), vec![7u8; 1024]).unwrap();

        let wayvnc = base.join("wayvnc");
        fs::create_dir_all(&wayvnc).unwrap();
        fs::write(wayvnc.join("config"), "address=0.0.0.0\nenable_auth=true\n").unwrap();

        let password = base.join("vnc-password.txt");
        fs::write(&password, "hunter2\n").unwrap();

        let mut settings = Settings::default().with_backup_root(base.join("backups"));
        settings.sources = SourcePaths {
            waydroid_state_dir: state,
            user_data_parent: share,
            wayvnc_config_dir: wayvnc,
            vnc_password_file: password,
        };
        settings.services.manager = ServiceManagerKind::None;
        settings.waydroid_binary = "/nonexistent/waydroid".to_string();

        Self { temp, settings }
    }
}

/// Write a complete backup directory `offset` hours after a fixed epoch
pub fn fake_backup(root: &Path, offset: i64) -> BackupName {
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let name = BackupName::from_timestamp(base + Duration::hours(offset));
    let dir = root.join(name.as_str());
    fs::create_dir_all(&dir).unwrap();

    Manifest::new(&name, BackupKind::DataOnly, "test-host", "1.4.3")
        .write(&dir.join(MANIFEST_FILE))
        .unwrap();
    fs::write(dir.join(SIZE_FILE), "4.0K\n").unwrap();

    name
}
