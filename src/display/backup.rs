//! Backup display formatting
//!
//! Formats backups for terminal output in table and detail views.

use tabled::{Table, Tabled};

use crate::archive::ArchiveReport;
use crate::backup::{BackupSummary, RestoreReport};

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&BackupSummary> for BackupRow {
    fn from(summary: &BackupSummary) -> Self {
        Self {
            name: summary.name.to_string(),
            date: summary.date_label(),
            kind: summary.kind_label(),
            size: summary.size_label().to_string(),
            status: if summary.is_complete() {
                "complete".to_string()
            } else {
                "incomplete".to_string()
            },
        }
    }
}

/// Format a list of backups as a table
pub fn format_backup_list(backups: &[BackupSummary]) -> String {
    if backups.is_empty() {
        return "No backups found.".to_string();
    }

    let rows: Vec<BackupRow> = backups.iter().map(BackupRow::from).collect();
    let complete = backups.iter().filter(|b| b.is_complete()).count();

    let mut output = Table::new(rows).to_string();
    output.push('\n');
    output.push_str(&format!(
        "Total: {} backup(s), {} complete\n",
        backups.len(),
        complete
    ));
    output
}

/// Format a single backup's details
pub fn format_backup_details(summary: &BackupSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("Backup: {}\n", summary.name));
    output.push_str(&format!("  Location:  {}\n", summary.path.display()));
    output.push_str(&format!("  Created:   {}\n", summary.date_label()));
    output.push_str(&format!("  Type:      {}\n", summary.kind_label()));
    output.push_str(&format!("  Size:      {}\n", summary.size_label()));
    if let Some(manifest) = &summary.manifest {
        output.push_str(&format!("  Host:      {}\n", manifest.hostname));
        output.push_str(&format!("  Waydroid:  {}\n", manifest.waydroid_version));
    }
    output.push_str(&format!(
        "  Status:    {}\n",
        if summary.is_complete() {
            "Complete"
        } else {
            "Incomplete"
        }
    ));

    output.push_str("\nContents:\n");
    if summary.components.is_empty() {
        output.push_str("  (none)\n");
    }
    for component in &summary.components {
        output.push_str(&format!("  {:<10} {}\n", component, component.file_name()));
    }

    output
}

/// Format the result of a restore
pub fn format_restore_report(report: &RestoreReport) -> String {
    let mut output = format!("Restored {}\n", report.backup);
    output.push_str(&format!("{}\n", report.summary()));
    for failure in &report.restart_failures {
        output.push_str(&format!("Warning: {}\n", failure));
    }
    output
}

/// Format the result of archive validation
pub fn format_archive_report(report: &ArchiveReport) -> String {
    let top: Vec<&str> = report.top_level.iter().map(String::as_str).collect();
    format!(
        "OK: {} member(s), top level: {}\n",
        report.member_count,
        top.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{BackupKind, BackupName, BackupStatus, Component, Manifest};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn summary(complete: bool) -> BackupSummary {
        let name = BackupName::from_timestamp(Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap());
        BackupSummary {
            path: PathBuf::from("/var/backups/waydroid").join(name.as_str()),
            manifest: complete.then(|| Manifest::new(&name, BackupKind::Full, "host", "1.4.3")),
            size: complete.then(|| "1.2G".to_string()),
            status: if complete {
                BackupStatus::Complete
            } else {
                BackupStatus::Incomplete
            },
            components: vec![Component::Config, Component::UserData],
            name,
        }
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_backup_list(&[]), "No backups found.");
    }

    #[test]
    fn test_list_table() {
        let output = format_backup_list(&[summary(true), summary(false)]);
        assert!(output.contains("waydroid-backup-20250304-050607"));
        assert!(output.contains("2025-03-04 05:06:07 UTC"));
        assert!(output.contains("full"));
        assert!(output.contains("1.2G"));
        assert!(output.contains("unknown"));
        assert!(output.contains("incomplete"));
        assert!(output.contains("Total: 2 backup(s), 1 complete"));
    }

    #[test]
    fn test_details() {
        let output = format_backup_details(&summary(true));
        assert!(output.contains("Host:      host"));
        assert!(output.contains("userdata.tar.gz"));
        assert!(output.contains("Status:    Complete"));
    }

    #[test]
    fn test_archive_report() {
        let report = ArchiveReport {
            member_count: 3,
            top_level: BTreeSet::from(["data".to_string()]),
        };
        assert_eq!(
            format_archive_report(&report),
            "OK: 3 member(s), top level: data\n"
        );
    }
}
