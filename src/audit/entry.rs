//! Audit entry data structures
//!
//! Defines the lifecycle operations that are audited and the entry format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Restore,
    Delete,
    Clean,
    Export,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Restore => write!(f, "RESTORE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Clean => write!(f, "CLEAN"),
            Operation::Export => write!(f, "EXPORT"),
            Operation::Import => write!(f, "IMPORT"),
        }
    }
}

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    /// The caller did not confirm a destructive operation
    Declined,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation finished (UTC)
    pub timestamp: DateTime<Utc>,

    /// Operation performed
    pub operation: Operation,

    /// Backup the operation applied to
    pub backup_name: String,

    /// How it ended
    pub outcome: Outcome,

    /// Error message or extra context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    fn new(operation: Operation, backup_name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            backup_name: backup_name.into(),
            outcome,
            detail: None,
        }
    }

    /// Entry for a completed operation
    pub fn success(operation: Operation, backup_name: impl Into<String>) -> Self {
        Self::new(operation, backup_name, Outcome::Success)
    }

    /// Entry for a failed operation, recording the error message
    pub fn failed(
        operation: Operation,
        backup_name: impl Into<String>,
        error: &impl fmt::Display,
    ) -> Self {
        Self::new(operation, backup_name, Outcome::Failed).with_detail(error.to_string())
    }

    /// Entry for an operation the caller did not confirm
    pub fn declined(operation: Operation, backup_name: impl Into<String>) -> Self {
        Self::new(operation, backup_name, Outcome::Declined)
    }

    /// Attach extra context
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Single-line human-readable form
    pub fn format_human_readable(&self) -> String {
        let mut line = format!(
            "{} {} {} {:?}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.backup_name,
            self.outcome
        );
        if let Some(detail) = &self.detail {
            line.push_str(" - ");
            line.push_str(detail);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_shape() {
        let entry = AuditEntry::success(Operation::Create, "waydroid-backup-20250101-120000");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["operation"], "create");
        assert_eq!(json["outcome"], "success");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn test_failed_records_error() {
        let err = crate::error::BackupError::Validation("bad member".into());
        let entry = AuditEntry::failed(Operation::Restore, "waydroid-backup-20250101-120000", &err);

        assert_eq!(entry.outcome, Outcome::Failed);
        assert_eq!(entry.detail.as_deref(), Some("Validation error: bad member"));
        assert!(entry.format_human_readable().contains("RESTORE"));
    }
}
