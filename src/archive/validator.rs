//! Archive validation
//!
//! Decides, before anything is extracted, whether a `.tar.gz` is safe to
//! unpack. Every member path goes through [`MemberPath::parse`]; one bad
//! member rejects the whole archive.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use super::codec::list_members;
use super::member::MemberPath;
use crate::error::BackupError;

/// Summary of an archive that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Number of members
    pub member_count: usize,
    /// Distinct first path segments
    pub top_level: BTreeSet<String>,
}

/// Reason an archive was refused (first violation found)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub reason: String,
}

impl Rejected {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Convert into a validation error naming the archive
    pub fn into_error(self, archive_path: &Path) -> BackupError {
        BackupError::Validation(format!(
            "{} rejected: {}",
            archive_path.display(),
            self.reason
        ))
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for Rejected {}

/// Validate an archive without extracting it
///
/// With `expected_prefix`, every member must be the prefix directory or live
/// below it. A regular file named exactly like the prefix is refused.
pub fn validate(archive_path: &Path, expected_prefix: Option<&str>) -> Result<ArchiveReport, Rejected> {
    let members = list_members(archive_path)
        .map_err(|e| Rejected::new(format!("unreadable archive: {}", e)))?;

    if members.is_empty() {
        return Err(Rejected::new("empty archive"));
    }

    let mut top_level = BTreeSet::new();
    for member in &members {
        let path = MemberPath::parse(&member.path).map_err(|violation| {
            Rejected::new(format!(
                "unsafe member {:?}: {}",
                String::from_utf8_lossy(&member.path),
                violation
            ))
        })?;

        if let Some(prefix) = expected_prefix {
            if !path.is_under(prefix, member.is_dir) {
                return Err(Rejected::new(format!(
                    "member {:?} is outside expected prefix \"{}/\"",
                    path.as_str(),
                    prefix
                )));
            }
        }

        if let Some(target) = &member.hard_link_target {
            let target_path = MemberPath::parse(target).map_err(|violation| {
                Rejected::new(format!(
                    "unsafe hard link target {:?} for {:?}: {}",
                    String::from_utf8_lossy(target),
                    path.as_str(),
                    violation
                ))
            })?;
            if let Some(prefix) = expected_prefix {
                if !target_path.is_under(prefix, false) {
                    return Err(Rejected::new(format!(
                        "hard link {:?} points outside expected prefix \"{}/\"",
                        path.as_str(),
                        prefix
                    )));
                }
            }
        }

        top_level.insert(path.top_level().to_string());
    }

    tracing::debug!(
        archive = %archive_path.display(),
        members = members.len(),
        "Archive passed validation"
    );

    Ok(ArchiveReport {
        member_count: members.len(),
        top_level,
    })
}
