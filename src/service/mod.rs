//! Service control for quiescing Waydroid around backups and restores
//!
//! Managed services are a closed enum resolved to unit names through a fixed
//! table; no unit name is ever built from user input.

mod quiesce;
mod systemd;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::settings::{ServiceManagerKind, Settings};
use crate::error::BackupResult;

pub use quiesce::QuiescedServices;
pub use systemd::{NullController, SystemdController};

/// A service that must be stopped while its data is copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagedService {
    /// The Waydroid LXC container
    #[serde(rename = "waydroid-container")]
    WaydroidContainer,
    /// The wayvnc server exporting the session
    #[serde(rename = "wayvnc")]
    WayVnc,
}

impl ManagedService {
    /// Every managed service
    pub const ALL: [ManagedService; 2] = [ManagedService::WaydroidContainer, ManagedService::WayVnc];

    /// systemd unit for this service
    pub fn unit_name(self) -> &'static str {
        match self {
            ManagedService::WaydroidContainer => "waydroid-container.service",
            ManagedService::WayVnc => "wayvnc.service",
        }
    }
}

impl fmt::Display for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit_name())
    }
}

/// Start, stop and query managed services
pub trait ServiceController {
    fn stop(&self, service: ManagedService) -> BackupResult<()>;
    fn start(&self, service: ManagedService) -> BackupResult<()>;
    fn is_active(&self, service: ManagedService) -> bool;
}

/// Build the controller selected in settings
pub fn controller_for(settings: &Settings) -> Box<dyn ServiceController> {
    match settings.services.manager {
        ServiceManagerKind::Systemd => Box::new(SystemdController::new()),
        ServiceManagerKind::None => Box::new(NullController),
    }
}
