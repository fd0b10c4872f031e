//! Backup names
//!
//! A backup is identified by `waydroid-backup-YYYYMMDD-HHMMSS` (UTC). Names
//! sort chronologically, and the embedded timestamp is the creation time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use crate::archive::MemberPath;
use crate::error::{BackupError, BackupResult};

/// Prefix shared by every backup directory
pub const NAME_PREFIX: &str = "waydroid-backup-";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A validated backup name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupName {
    name: String,
    created_at: DateTime<Utc>,
}

impl BackupName {
    /// Name for a backup created at `timestamp` (sub-second part dropped)
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        let created_at = timestamp.trunc_subsecs(0);
        Self {
            name: format!("{}{}", NAME_PREFIX, created_at.format(TIMESTAMP_FORMAT)),
            created_at,
        }
    }

    /// Name for a backup created now
    pub fn now() -> Self {
        Self::from_timestamp(Utc::now())
    }

    /// Parse and validate a user-supplied name
    ///
    /// The name must pass the archive member path rules as a single segment
    /// before its shape is even looked at.
    pub fn parse(input: &str) -> BackupResult<Self> {
        let path = MemberPath::parse(input.as_bytes()).map_err(|violation| {
            BackupError::Validation(format!("invalid backup name {:?}: {}", input, violation))
        })?;
        if path.segments().len() != 1 || path.is_dir() {
            return Err(BackupError::Validation(format!(
                "invalid backup name {:?}: must be a single path segment",
                input
            )));
        }

        let created_at = input
            .strip_prefix(NAME_PREFIX)
            .and_then(parse_backup_timestamp)
            .ok_or_else(|| {
                BackupError::Validation(format!(
                    "invalid backup name {:?}: expected {}YYYYMMDD-HHMMSS",
                    input, NAME_PREFIX
                ))
            })?;

        Ok(Self {
            name: input.to_string(),
            created_at,
        })
    }

    /// The name as a string
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Creation time encoded in the name
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for BackupName {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BackupName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl AsRef<std::path::Path> for BackupName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.name)
    }
}

/// Parse `YYYYMMDD-HHMMSS`, requiring exactly that many digits
fn parse_backup_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    let bytes = date_str.as_bytes();
    if bytes.len() != 15 || bytes[8] != b'-' {
        return None;
    }
    let digits_only = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 8 || b.is_ascii_digit());
    if !digits_only {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(date_str, TIMESTAMP_FORMAT).ok()?;
    Some(naive.and_utc())
}
