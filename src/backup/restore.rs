//! Backup restoration for waydroid-backup
//!
//! Restores a stored backup over the live installation. Archives are
//! validated right before they are extracted and extraction is staged next
//! to the target, so a bad archive never replaces the current data.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::Path;

use super::name::BackupName;
use super::{Component, IMAGES_PREFIX, USERDATA_PREFIX};
use crate::archive::{unpack, validate};
use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::config::settings::Settings;
use crate::error::{BackupError, BackupResult};
use crate::service::{QuiescedServices, ServiceController};
use crate::storage::{copy_tree, remove_path};

/// Phases of a restore, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Confirming,
    StoppingServices,
    Validating,
    Extracting,
    RestartingServices,
    Done,
    Failed,
}

/// Result of a restore request that did not error
#[derive(Debug)]
pub enum RestoreOutcome {
    /// The caller did not confirm; nothing was changed
    NotConfirmed,
    /// The backup was applied
    Restored(RestoreReport),
}

/// What a successful restore did
#[derive(Debug)]
pub struct RestoreReport {
    pub backup: BackupName,
    /// Members applied, in order
    pub restored: Vec<Component>,
    /// Phase trail from `Idle` to `Done`
    pub phases: Vec<RestorePhase>,
    /// Services that failed to come back up
    pub restart_failures: Vec<String>,
}

impl RestoreReport {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self.restored.iter().map(|c| c.to_string()).collect();
        if parts.is_empty() {
            "Restored: nothing".to_string()
        } else {
            format!("Restored: {}", parts.join(", "))
        }
    }
}

/// Records phase transitions and logs each one
struct PhaseTrail {
    backup: String,
    phases: Vec<RestorePhase>,
}

impl PhaseTrail {
    fn new(backup: &str) -> Self {
        Self {
            backup: backup.to_string(),
            phases: vec![RestorePhase::Idle],
        }
    }

    fn enter(&mut self, phase: RestorePhase) {
        if self.phases.last() != Some(&phase) {
            tracing::info!(backup = %self.backup, phase = ?phase, "Restore phase");
            self.phases.push(phase);
        }
    }
}

/// Handles restoring from backups
pub struct RestoreManager<'a> {
    settings: &'a Settings,
    services: &'a dyn ServiceController,
    audit: Option<&'a AuditLogger>,
    last_phases: RefCell<Vec<RestorePhase>>,
}

impl<'a> RestoreManager<'a> {
    /// Create a new RestoreManager
    pub fn new(settings: &'a Settings, services: &'a dyn ServiceController) -> Self {
        Self {
            settings,
            services,
            audit: None,
            last_phases: RefCell::new(Vec::new()),
        }
    }

    /// Record restores in `audit`
    pub fn with_audit(mut self, audit: &'a AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Phase trail of the most recent restore, including failed ones
    ///
    /// Empty when the name was invalid or the backup did not exist.
    pub fn last_phases(&self) -> Vec<RestorePhase> {
        self.last_phases.borrow().clone()
    }

    /// Restore the named backup over the live installation
    ///
    /// Nothing is touched unless `confirmed` is true. Members already applied
    /// stay in place if a later one fails; services stopped for the restore
    /// are restarted either way.
    pub fn restore(&self, name: &str, confirmed: bool) -> BackupResult<RestoreOutcome> {
        self.last_phases.borrow_mut().clear();

        let name = BackupName::parse(name)?;
        let dir = self.settings.backup_root.join(name.as_str());
        if !dir.is_dir() {
            return Err(BackupError::backup_not_found(name.as_str()));
        }

        let mut trail = PhaseTrail::new(name.as_str());
        let result = self.run(name, &dir, confirmed, &mut trail);
        *self.last_phases.borrow_mut() = trail.phases;
        result
    }

    fn run(
        &self,
        name: BackupName,
        dir: &Path,
        confirmed: bool,
        trail: &mut PhaseTrail,
    ) -> BackupResult<RestoreOutcome> {
        trail.enter(RestorePhase::Confirming);
        if !confirmed {
            tracing::info!(backup = %name, "Restore not confirmed, nothing changed");
            self.record(AuditEntry::declined(Operation::Restore, name.as_str()));
            return Ok(RestoreOutcome::NotConfirmed);
        }

        trail.enter(RestorePhase::StoppingServices);
        let guard = match QuiescedServices::acquire(self.services, &self.settings.services.managed)
        {
            Ok(guard) => guard,
            Err(e) => {
                trail.enter(RestorePhase::Failed);
                self.record(AuditEntry::failed(Operation::Restore, name.as_str(), &e));
                return Err(e);
            }
        };

        let mut restored = Vec::new();
        let applied = self.apply(dir, trail, &mut restored);

        trail.enter(RestorePhase::RestartingServices);
        let restart_failures: Vec<String> =
            guard.release().into_iter().map(|e| e.to_string()).collect();

        match applied {
            Ok(()) => {
                trail.enter(RestorePhase::Done);
                let report = RestoreReport {
                    backup: name,
                    restored,
                    phases: trail.phases.clone(),
                    restart_failures,
                };
                let mut detail = report.summary();
                if !report.restart_failures.is_empty() {
                    detail.push_str("; restart failures: ");
                    detail.push_str(&report.restart_failures.join("; "));
                }
                self.record(
                    AuditEntry::success(Operation::Restore, report.backup.as_str())
                        .with_detail(detail),
                );
                Ok(RestoreOutcome::Restored(report))
            }
            Err(e) => {
                trail.enter(RestorePhase::Failed);
                tracing::error!(
                    backup = %name,
                    error = %e,
                    applied = ?restored,
                    "Restore aborted; members already applied were kept"
                );
                self.record(AuditEntry::failed(Operation::Restore, name.as_str(), &e));
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        dir: &Path,
        trail: &mut PhaseTrail,
        restored: &mut Vec<Component>,
    ) -> BackupResult<()> {
        let sources = &self.settings.sources;

        // Every member is checked before the first one is applied
        trail.enter(RestorePhase::Validating);
        let mut present = Vec::new();
        for component in Component::ALL {
            if let Some(file_type) = member_type(dir, component)? {
                present.push((component, file_type));
            }
        }

        for (component, file_type) in present {
            let src = dir.join(component.file_name());
            match component {
                Component::Config if file_type.is_dir() => {
                    trail.enter(RestorePhase::Extracting);
                    fs::create_dir_all(&sources.waydroid_state_dir)?;
                    copy_tree(&src, &sources.waydroid_state_dir)?;
                }
                Component::WayVnc if file_type.is_dir() => {
                    trail.enter(RestorePhase::Extracting);
                    copy_tree(&src, &sources.wayvnc_config_dir)?;
                }
                Component::Password if file_type.is_file() => {
                    trail.enter(RestorePhase::Extracting);
                    if let Some(parent) = sources.vnc_password_file.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::copy(&src, &sources.vnc_password_file)?;
                }
                Component::UserData if file_type.is_file() => {
                    restore_archive(&src, USERDATA_PREFIX, &sources.user_data_parent, trail)?;
                }
                Component::Images if file_type.is_file() => {
                    restore_archive(&src, IMAGES_PREFIX, &sources.waydroid_state_dir, trail)?;
                }
                _ => {
                    tracing::warn!(member = %src.display(), "Unexpected file type, skipping");
                    continue;
                }
            }
            restored.push(component);
        }

        Ok(())
    }

    fn record(&self, entry: AuditEntry) {
        if let Some(audit) = self.audit {
            if let Err(e) = audit.log(&entry) {
                tracing::warn!(error = %e, "Failed to write audit entry");
            }
        }
    }
}

/// File type of a backup member, or None when it is absent
///
/// Symlinks are refused: a member must never pull data from outside the
/// backup directory.
fn member_type(dir: &Path, component: Component) -> BackupResult<Option<fs::FileType>> {
    let path = dir.join(component.file_name());
    match fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(BackupError::Validation(format!(
            "{} is a symlink; refusing to restore through it",
            path.display()
        ))),
        Ok(meta) => Ok(Some(meta.file_type())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BackupError::Io(format!(
            "Failed to inspect {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Validate `archive`, unpack it beside `parent/prefix` and swap it in
fn restore_archive(
    archive: &Path,
    prefix: &str,
    parent: &Path,
    trail: &mut PhaseTrail,
) -> BackupResult<()> {
    trail.enter(RestorePhase::Validating);
    let report = validate(archive, Some(prefix)).map_err(|r| r.into_error(archive))?;
    tracing::info!(archive = %archive.display(), members = report.member_count, "Archive validated");

    trail.enter(RestorePhase::Extracting);
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".waydroid-restore-")
        .tempdir_in(parent)
        .map_err(|e| BackupError::Io(format!("Failed to create staging directory: {}", e)))?;

    unpack(archive, staging.path())?;

    let staged = staging.path().join(prefix);
    if !staged.is_dir() {
        return Err(BackupError::Validation(format!(
            "{} has no {}/ directory",
            archive.display(),
            prefix
        )));
    }

    let target = parent.join(prefix);
    if fs::symlink_metadata(&target).is_ok() {
        remove_path(&target)?;
    }
    fs::rename(&staged, &target).map_err(|e| {
        BackupError::Io(format!(
            "Failed to move restored {} into place: {}",
            target.display(),
            e
        ))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::test_support::{fake_backup, TestEnv};
    use crate::backup::{BackupKind, BackupManager, PASSWORD_FILE, USERDATA_ARCHIVE};
    use crate::service::testing::RecordingController;
    use crate::service::ManagedService;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use tar::{Builder, EntryType, Header};

    fn restored_report(outcome: RestoreOutcome) -> RestoreReport {
        match outcome {
            RestoreOutcome::Restored(report) => report,
            RestoreOutcome::NotConfirmed => panic!("restore was not confirmed"),
        }
    }

    /// Replace an archive with one holding a single verbatim member name
    fn write_hostile_archive(path: &Path, member: &[u8]) {
        let file = File::create(path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = Header::new_gnu();
        header.set_size(1);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        let field = &mut header.as_old_mut().name;
        field.iter_mut().for_each(|b| *b = 0);
        field[..member.len()].copy_from_slice(member);
        header.set_cksum();
        builder.append(&header, &b"x"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_restore_round_trip() {
        let env = TestEnv::new();
        let controller = RecordingController::default();
        let handle = BackupManager::new(&env.settings, &controller)
            .create(BackupKind::Full)
            .unwrap();

        let sources = &env.settings.sources;
        let packages = sources.user_data_dir().join("system/packages.xml");
        fs::write(&packages, "<changed/>").unwrap();
        fs::write(sources.user_data_dir().join("junk"), "new file").unwrap();
        fs::write(sources.waydroid_state_dir.join("waydroid.cfg"), "broken").unwrap();
        fs::remove_file(&sources.vnc_password_file).unwrap();

        let restore = RestoreManager::new(&env.settings, &controller);
        let report = restored_report(restore.restore(handle.name.as_str(), true).unwrap());

        assert_eq!(fs::read_to_string(&packages).unwrap(), "<packages/>");
        assert!(!sources.user_data_dir().join("junk").exists());
        assert_eq!(
            fs::read_to_string(sources.waydroid_state_dir.join("waydroid.cfg")).unwrap(),
            "[waydroid]\narch = x86_64\n"
        );
        assert_eq!(
            fs::read_to_string(&sources.vnc_password_file).unwrap(),
            "hunter2\n"
        );
        assert!(sources.images_dir().join("system.img").is_file());
        assert_eq!(report.restored, Component::ALL);
        assert_eq!(report.phases.first(), Some(&RestorePhase::Idle));
        assert_eq!(report.phases.last(), Some(&RestorePhase::Done));
        assert!(report.summary().contains("userdata"));
    }

    #[test]
    fn test_phase_order() {
        let env = TestEnv::new();
        let name = fake_backup(&env.settings.backup_root, 0);
        let controller = RecordingController::default();

        let report = restored_report(
            RestoreManager::new(&env.settings, &controller)
                .restore(name.as_str(), true)
                .unwrap(),
        );

        // fake backups have no members, so nothing is extracted
        assert_eq!(
            report.phases,
            [
                RestorePhase::Idle,
                RestorePhase::Confirming,
                RestorePhase::StoppingServices,
                RestorePhase::Validating,
                RestorePhase::RestartingServices,
                RestorePhase::Done,
            ]
        );
    }

    #[test]
    fn test_unconfirmed_restore_changes_nothing() {
        let env = TestEnv::new();
        let controller = RecordingController::with_active(&[ManagedService::WaydroidContainer]);
        let handle = BackupManager::new(&env.settings, &controller)
            .create(BackupKind::DataOnly)
            .unwrap();
        let calls_before = controller.calls().len();

        let packages = env.settings.sources.user_data_dir().join("system/packages.xml");
        fs::write(&packages, "<changed/>").unwrap();

        let outcome = RestoreManager::new(&env.settings, &controller)
            .restore(handle.name.as_str(), false)
            .unwrap();

        assert!(matches!(outcome, RestoreOutcome::NotConfirmed));
        assert_eq!(fs::read_to_string(&packages).unwrap(), "<changed/>");
        assert_eq!(controller.calls().len(), calls_before);
    }

    #[test]
    fn test_missing_backup_is_not_found() {
        let env = TestEnv::new();
        let controller = RecordingController::with_active(&[ManagedService::WaydroidContainer]);

        let err = RestoreManager::new(&env.settings, &controller)
            .restore("waydroid-backup-20200101-000000", true)
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(controller.calls().is_empty());
        assert!(!env.settings.backup_root.exists());
    }

    #[test]
    fn test_injected_name_rejected_before_anything_runs() {
        let env = TestEnv::new();
        let controller = RecordingController::with_active(&[ManagedService::WaydroidContainer]);

        let err = RestoreManager::new(&env.settings, &controller)
            .restore("waydroid-backup-20250101-000000; rm -rf /", true)
            .unwrap_err();

        assert!(err.is_validation());
        assert!(controller.calls().is_empty());
    }

    #[test]
    fn test_tampered_archive_aborts_and_restarts_services() {
        let env = TestEnv::new();
        let controller = RecordingController::with_active(&[ManagedService::WaydroidContainer]);
        let handle = BackupManager::new(&env.settings, &controller)
            .create(BackupKind::DataOnly)
            .unwrap();

        write_hostile_archive(&handle.path.join(USERDATA_ARCHIVE), b"data/../../evil");
        let packages = env.settings.sources.user_data_dir().join("system/packages.xml");
        fs::write(&packages, "<current/>").unwrap();

        let audit = AuditLogger::new(env.temp.path().join("audit.log"));
        let restore = RestoreManager::new(&env.settings, &controller).with_audit(&audit);
        let err = restore.restore(handle.name.as_str(), true).unwrap_err();

        assert!(err.is_validation(), "{}", err);
        let phases = restore.last_phases();
        assert_eq!(
            phases[phases.len() - 3..],
            [
                RestorePhase::Validating,
                RestorePhase::RestartingServices,
                RestorePhase::Failed,
            ]
        );
        // current user data untouched, config (applied earlier) kept
        assert_eq!(fs::read_to_string(&packages).unwrap(), "<current/>");
        assert!(controller.active(ManagedService::WaydroidContainer));
        assert_eq!(
            controller.calls().last().map(String::as_str),
            Some("start waydroid-container.service")
        );

        let entries = audit.read_all().unwrap();
        assert_eq!(entries.last().unwrap().outcome, crate::audit::Outcome::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_member_refused_before_anything_is_applied() {
        let env = TestEnv::new();
        let controller = RecordingController::with_active(&[ManagedService::WaydroidContainer]);
        let handle = BackupManager::new(&env.settings, &controller)
            .create(BackupKind::DataOnly)
            .unwrap();

        let secret = env.temp.path().join("host-secret");
        fs::write(&secret, "host only\n").unwrap();
        let member = handle.path.join(PASSWORD_FILE);
        fs::remove_file(&member).unwrap();
        std::os::unix::fs::symlink(&secret, &member).unwrap();

        let cfg = env.settings.sources.waydroid_state_dir.join("waydroid.cfg");
        fs::write(&cfg, "current").unwrap();

        let restore = RestoreManager::new(&env.settings, &controller);
        let err = restore.restore(handle.name.as_str(), true).unwrap_err();

        assert!(err.is_validation(), "{}", err);
        assert!(err.to_string().contains("symlink"), "{}", err);
        assert_eq!(
            fs::read_to_string(&env.settings.sources.vnc_password_file).unwrap(),
            "hunter2\n"
        );
        assert_eq!(fs::read_to_string(&cfg).unwrap(), "current");
        assert!(controller.active(ManagedService::WaydroidContainer));
        assert!(!restore.last_phases().contains(&RestorePhase::Extracting));
        assert_eq!(restore.last_phases().last(), Some(&RestorePhase::Failed));
    }

    #[test]
    fn test_last_phases_empty_for_missing_backup() {
        let env = TestEnv::new();
        let controller = RecordingController::default();
        let restore = RestoreManager::new(&env.settings, &controller);

        assert!(restore
            .restore("waydroid-backup-20200101-000000", true)
            .is_err());
        assert!(restore.last_phases().is_empty());
    }

    #[test]
    fn test_archive_with_wrong_prefix_rejected() {
        let env = TestEnv::new();
        let controller = RecordingController::default();
        let handle = BackupManager::new(&env.settings, &controller)
            .create(BackupKind::DataOnly)
            .unwrap();

        write_hostile_archive(&handle.path.join(USERDATA_ARCHIVE), b"etc/cron.d/job");

        let err = RestoreManager::new(&env.settings, &controller)
            .restore(handle.name.as_str(), true)
            .unwrap_err();
        assert!(err.to_string().contains("outside expected prefix"), "{}", err);
        assert!(!env.settings.sources.user_data_parent.join("etc").exists());
    }
}
