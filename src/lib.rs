//! waydroid-backup - Backup and restore for Waydroid installations
//!
//! This library creates, lists, prunes, restores, exports and imports
//! backups of a Waydroid installation. Every archive that is about to be
//! extracted is validated member by member first.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `archive`: Member path tokenizer, archive validator and tar/gzip codec
//! - `backup`: Backup lifecycle, restore and transfer
//! - `service`: Stopping and restarting services around copies
//! - `storage`: Atomic JSON files and tree copies
//! - `audit`: Audit logging system
//! - `cli`, `display`: Command handlers and terminal output
//!
//! # Example
//!
//! ```rust,ignore
//! use waydroid_backup::config::{paths::BackupPaths, settings::Settings};
//!
//! let paths = BackupPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod archive;
pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod service;
pub mod storage;

pub use error::BackupError;
