//! Scoped quiescing of managed services
//!
//! [`QuiescedServices`] stops every configured service that is running and
//! restarts exactly those when it is released or dropped, so early returns
//! and `?` never leave Waydroid down.

use super::{ManagedService, ServiceController};
use crate::error::{BackupError, BackupResult};

/// Guard holding services stopped for the duration of a copy
pub struct QuiescedServices<'a> {
    controller: &'a dyn ServiceController,
    stopped: Vec<ManagedService>,
    released: bool,
}

impl<'a> QuiescedServices<'a> {
    /// Stop each active service in `services`, in order
    ///
    /// If a stop fails, the services already stopped are restarted before
    /// the error is returned.
    pub fn acquire(
        controller: &'a dyn ServiceController,
        services: &[ManagedService],
    ) -> BackupResult<Self> {
        let mut guard = Self {
            controller,
            stopped: Vec::new(),
            released: false,
        };

        for &service in services {
            if !controller.is_active(service) {
                tracing::debug!(unit = service.unit_name(), "Service not active, leaving it");
                continue;
            }
            tracing::info!(unit = service.unit_name(), "Stopping service");
            controller.stop(service)?;
            guard.stopped.push(service);
        }

        Ok(guard)
    }

    /// Services this guard stopped
    pub fn stopped(&self) -> &[ManagedService] {
        &self.stopped
    }

    /// Restart the stopped services now and report failures
    pub fn release(mut self) -> Vec<BackupError> {
        self.restart()
    }

    fn restart(&mut self) -> Vec<BackupError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut failures = Vec::new();
        for &service in self.stopped.iter().rev() {
            tracing::info!(unit = service.unit_name(), "Starting service");
            if let Err(e) = self.controller.start(service) {
                tracing::warn!(unit = service.unit_name(), error = %e, "Failed to restart service");
                failures.push(e);
            }
        }
        failures
    }
}

impl Drop for QuiescedServices<'_> {
    fn drop(&mut self) {
        self.restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::RecordingController;

    use ManagedService::{WayVnc, WaydroidContainer};

    #[test]
    fn test_stops_only_active_and_restarts_in_reverse() {
        let controller = RecordingController::with_active(&[WayVnc, WaydroidContainer]);

        let guard = QuiescedServices::acquire(&controller, &[WayVnc, WaydroidContainer]).unwrap();
        assert_eq!(guard.stopped(), [WayVnc, WaydroidContainer]);
        assert!(!controller.active(WaydroidContainer));

        assert!(guard.release().is_empty());
        assert_eq!(
            controller.calls(),
            [
                "stop wayvnc.service",
                "stop waydroid-container.service",
                "start waydroid-container.service",
                "start wayvnc.service",
            ]
        );
    }

    #[test]
    fn test_inactive_services_are_left_alone() {
        let controller = RecordingController::with_active(&[WaydroidContainer]);

        let guard = QuiescedServices::acquire(&controller, &[WayVnc, WaydroidContainer]).unwrap();
        drop(guard);

        assert_eq!(
            controller.calls(),
            ["stop waydroid-container.service", "start waydroid-container.service"]
        );
        assert!(!controller.active(WayVnc));
    }

    #[test]
    fn test_drop_restarts_on_early_return() {
        let controller = RecordingController::with_active(&[WaydroidContainer]);

        let result: BackupResult<()> = (|| {
            let _guard = QuiescedServices::acquire(&controller, &[WaydroidContainer])?;
            Err(BackupError::Io("disk full".into()))
        })();

        assert!(result.is_err());
        assert!(controller.active(WaydroidContainer));
    }

    #[test]
    fn test_failed_stop_restarts_already_stopped() {
        let controller = RecordingController::with_active(&[WayVnc, WaydroidContainer])
            .failing_stop(WaydroidContainer);

        let err = QuiescedServices::acquire(&controller, &[WayVnc, WaydroidContainer]).err();
        assert!(matches!(err, Some(BackupError::Operation(_))));
        assert_eq!(
            controller.calls(),
            [
                "stop wayvnc.service",
                "stop waydroid-container.service",
                "start wayvnc.service",
            ]
        );
    }

    #[test]
    fn test_release_reports_restart_failures_once() {
        let controller =
            RecordingController::with_active(&[WaydroidContainer]).failing_start(WaydroidContainer);

        let guard = QuiescedServices::acquire(&controller, &[WaydroidContainer]).unwrap();
        let failures = guard.release();

        assert_eq!(failures.len(), 1);
        // drop after release must not try again
        assert_eq!(controller.calls().len(), 2);
    }
}
