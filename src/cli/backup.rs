//! Backup lifecycle CLI commands
//!
//! Implements the top-level commands: backup, list, restore, clean, export,
//! import, delete, info, audit and verify.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use clap::Subcommand;

use crate::archive::validate;
use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::backup::{BackupKind, BackupManager, RestoreManager, RestoreOutcome};
use crate::config::settings::Settings;
use crate::display::{
    format_archive_report, format_backup_details, format_backup_list, format_restore_report,
};
use crate::error::{BackupError, BackupResult};
use crate::service::ServiceController;

/// Lifecycle subcommands
#[derive(Subcommand)]
pub enum LifecycleCommands {
    /// Create a new backup
    Backup {
        /// Include the system images
        #[arg(long)]
        full: bool,
    },

    /// List all backups
    List,

    /// Restore a backup over the live installation
    Restore {
        /// Backup name (waydroid-backup-YYYYMMDD-HHMMSS)
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete the oldest complete backups beyond the retention limit
    Clean {
        /// Number of backups to keep (defaults to max_backups)
        #[arg(short, long)]
        keep: Option<usize>,
    },

    /// Export a backup as a portable .tar.gz
    Export {
        /// Backup name
        name: String,

        /// Directory to write the archive to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Import a previously exported backup
    Import {
        /// Path to the exported archive
        archive: PathBuf,
    },

    /// Delete a single backup
    Delete {
        /// Backup name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show information about a specific backup
    Info {
        /// Backup name
        name: String,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },

    /// Check that an archive is safe to extract
    Verify {
        /// Path to a .tar.gz archive
        archive: PathBuf,

        /// Require every member to live under this directory
        #[arg(short, long)]
        prefix: Option<String>,
    },
}

/// Handle a lifecycle command
pub fn handle_lifecycle_command(
    settings: &Settings,
    services: &dyn ServiceController,
    audit: &AuditLogger,
    cmd: LifecycleCommands,
) -> BackupResult<()> {
    let manager = BackupManager::new(settings, services).with_audit(audit);

    match cmd {
        LifecycleCommands::Backup { full } => {
            let kind = if full {
                BackupKind::Full
            } else {
                BackupKind::DataOnly
            };
            println!("Creating {} backup...", kind);
            let handle = manager.create(kind)?;
            println!("Backup created: {}", handle.name);
            println!("Location: {}", handle.path.display());
        }

        LifecycleCommands::List => {
            let backups = manager.list()?;
            if backups.is_empty() {
                println!("No backups found in {}.", manager.backup_root().display());
                println!("Create one with: waydroid-backup backup");
                return Ok(());
            }
            print!("{}", format_backup_list(&backups));
        }

        LifecycleCommands::Restore { name, yes } => {
            let summary = manager.get(&name)?;
            print!("{}", format_backup_details(&summary));
            println!();
            if !summary.is_complete() {
                println!("WARNING: This backup is incomplete.");
            }
            println!("WARNING: This will overwrite the current Waydroid data!");

            let confirmed = confirm("Restore this backup?", yes)?;
            let restore = RestoreManager::new(settings, services).with_audit(audit);
            match restore.restore(&name, confirmed)? {
                RestoreOutcome::Restored(report) => {
                    print!("{}", format_restore_report(&report));
                }
                RestoreOutcome::NotConfirmed => {
                    println!("To proceed without a prompt, run:");
                    println!("  waydroid-backup restore {} --yes", summary.name);
                    return Err(BackupError::Operation("Restore not confirmed".into()));
                }
            }
        }

        LifecycleCommands::Clean { keep } => {
            let keep = keep.unwrap_or(settings.max_backups);
            let removed = manager.clean(keep)?;
            if removed.is_empty() {
                println!("No backups to clean (keeping {}).", keep);
            } else {
                for handle in &removed {
                    println!("Removed {}", handle.name);
                }
                println!("Deleted {} backup(s).", removed.len());
            }
        }

        LifecycleCommands::Export { name, output } => {
            let path = manager.export(&name, &output)?;
            println!("Exported to {}", path.display());
        }

        LifecycleCommands::Import { archive } => {
            let handle = manager.import(&archive)?;
            println!("Imported {}", handle.name);
            println!("Location: {}", handle.path.display());
        }

        LifecycleCommands::Delete { name, yes } => {
            let summary = manager.get(&name)?;
            if !confirm(&format!("Delete {}?", summary.name), yes)? {
                if let Err(e) = audit.log(&AuditEntry::declined(
                    Operation::Delete,
                    summary.name.as_str(),
                )) {
                    tracing::warn!(error = %e, "Failed to write audit entry");
                }
                return Err(BackupError::Operation("Delete not confirmed".into()));
            }
            let handle = manager.delete(&name)?;
            println!("Deleted {}", handle.name);
        }

        LifecycleCommands::Info { name } => {
            let summary = manager.get(&name)?;
            print!("{}", format_backup_details(&summary));
        }

        LifecycleCommands::Audit { count } => {
            let entries = audit.read_recent(count)?;
            if entries.is_empty() {
                println!("No audit entries in {}.", audit.path().display());
                return Ok(());
            }
            for entry in &entries {
                println!("{}", entry.format_human_readable());
            }
        }

        LifecycleCommands::Verify { archive, prefix } => {
            let report =
                validate(&archive, prefix.as_deref()).map_err(|r| r.into_error(&archive))?;
            print!("{}", format_archive_report(&report));
        }
    }

    Ok(())
}

/// Ask for confirmation on an interactive terminal
///
/// Returns true straight away when `assume_yes` is set and false when stdin
/// is not a terminal.
fn confirm(question: &str, assume_yes: bool) -> BackupResult<bool> {
    if assume_yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        println!("Not running interactively; pass --yes to confirm.");
        return Ok(false);
    }

    print!("{} (yes/no): ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "yes" || answer == "y")
}
