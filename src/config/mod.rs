//! Configuration module for waydroid-backup
//!
//! This module provides configuration management including:
//! - Config directory resolution
//! - Settings persistence (backup root, retention, source locations)

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{ServiceManagerKind, ServiceSettings, Settings, SourcePaths};
