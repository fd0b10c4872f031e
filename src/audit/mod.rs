//! Audit logging for waydroid-backup
//!
//! Records every lifecycle operation (create, restore, delete, clean,
//! export, import) in an append-only JSONL log next to the settings file.
//!
//! # Example
//!
//! ```rust,ignore
//! use waydroid_backup::audit::{AuditEntry, AuditLogger, Operation};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! logger.log(&AuditEntry::success(Operation::Create, backup.name.as_str()))?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, Operation, Outcome};
pub use logger::AuditLogger;
