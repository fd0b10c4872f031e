//! Display formatting for terminal output
//!
//! Formats backups, restore results and validation reports as tables and
//! detail views.

pub mod backup;

pub use backup::{
    format_archive_report, format_backup_details, format_backup_list, format_restore_report,
};
