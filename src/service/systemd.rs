//! Service controllers backed by the host init system

use std::process::Command;

use super::{ManagedService, ServiceController};
use crate::error::{BackupError, BackupResult};

/// Controls units through `systemctl`
#[derive(Debug)]
pub struct SystemdController {
    program: String,
}

impl SystemdController {
    pub fn new() -> Self {
        Self {
            program: "systemctl".to_string(),
        }
    }

    /// Controller that runs `program` instead of `systemctl`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, verb: &str, service: ManagedService) -> BackupResult<()> {
        let unit = service.unit_name();
        let output = Command::new(&self.program)
            .args([verb, unit])
            .output()
            .map_err(|e| {
                BackupError::Operation(format!("{} {} {} failed: {}", self.program, verb, unit, e))
            })?;

        if !output.status.success() {
            return Err(BackupError::Operation(format!(
                "{} {} {} exited with {}: {}",
                self.program,
                verb,
                unit,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

impl Default for SystemdController {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceController for SystemdController {
    fn stop(&self, service: ManagedService) -> BackupResult<()> {
        self.run("stop", service)
    }

    fn start(&self, service: ManagedService) -> BackupResult<()> {
        self.run("start", service)
    }

    fn is_active(&self, service: ManagedService) -> bool {
        Command::new(&self.program)
            .args(["is-active", "--quiet", service.unit_name()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Leaves services alone and reports all of them as inactive
#[derive(Debug, Default, Clone, Copy)]
pub struct NullController;

impl ServiceController for NullController {
    fn stop(&self, _service: ManagedService) -> BackupResult<()> {
        Ok(())
    }

    fn start(&self, _service: ManagedService) -> BackupResult<()> {
        Ok(())
    }

    fn is_active(&self, _service: ManagedService) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_systemctl_reports_operation_error() {
        let controller = SystemdController::with_program("/nonexistent/systemctl");

        assert!(!controller.is_active(ManagedService::WayVnc));
        let err = controller.stop(ManagedService::WayVnc).unwrap_err();
        assert!(matches!(err, BackupError::Operation(ref m) if m.contains("wayvnc.service")));
    }

    #[test]
    fn test_null_controller() {
        let controller = NullController;
        assert!(!controller.is_active(ManagedService::WaydroidContainer));
        assert!(controller.stop(ManagedService::WaydroidContainer).is_ok());
        assert!(controller.start(ManagedService::WaydroidContainer).is_ok());
    }
}
