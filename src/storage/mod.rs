//! Storage helpers for waydroid-backup
//!
//! Atomic JSON writes, tree copies and size accounting shared by the backup
//! lifecycle and restore code.

pub mod file_io;

pub use file_io::{
    copy_tree, dir_size, format_size, read_json_required, remove_path, write_json_atomic,
};
