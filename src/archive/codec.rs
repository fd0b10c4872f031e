//! gzip-compressed tar reading and writing
//!
//! Thin wrappers around `tar` and `flate2` for the three things the backup
//! code needs: pack a directory under a fixed top-level name, list member
//! paths without extracting, and unpack into a destination directory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use walkdir::WalkDir;

use crate::error::{BackupError, BackupResult};

/// One entry of an archive listing, as raw header bytes
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Member path, including GNU long names and PAX overrides
    pub path: Vec<u8>,
    /// Target of a hard link entry (an archive-relative path)
    pub hard_link_target: Option<Vec<u8>>,
    /// Header entry type is a directory
    pub is_dir: bool,
}

/// Pack `src` into `dest` with every member under `<top_level>/`
///
/// Symlinks are stored as links and special files (sockets, fifos, devices)
/// are skipped. The archive is written to a `.partial` sibling and renamed
/// into place once compression has finished.
pub fn pack_dir(src: &Path, top_level: &str, dest: &Path) -> BackupResult<u64> {
    if !src.is_dir() {
        return Err(BackupError::file_not_found(src.display().to_string()));
    }

    let partial = partial_path(dest);
    let file = File::create(&partial)
        .map_err(|e| BackupError::Io(format!("Failed to create {}: {}", partial.display(), e)))?;

    let result = write_archive(src, top_level, file);
    let count = match result {
        Ok(count) => count,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    fs::rename(&partial, dest).map_err(|e| {
        let _ = fs::remove_file(&partial);
        BackupError::Io(format!("Failed to move archive into place: {}", e))
    })?;

    Ok(count)
}

fn write_archive(src: &Path, top_level: &str, file: File) -> BackupResult<u64> {
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut count = 0;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();

        if !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()) {
            tracing::warn!(path = %entry.path().display(), "Skipping special file");
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BackupError::Io(format!("Failed to relativize path: {}", e)))?;
        let name = Path::new(top_level).join(rel);

        builder
            .append_path_with_name(entry.path(), &name)
            .map_err(|e| {
                BackupError::Io(format!(
                    "Failed to add {} to archive: {}",
                    entry.path().display(),
                    e
                ))
            })?;
        count += 1;
    }

    let mut writer = builder
        .into_inner()
        .map_err(|e| BackupError::Io(format!("Failed to finish tar stream: {}", e)))?
        .finish()
        .map_err(|e| BackupError::Io(format!("Failed to finish compression: {}", e)))?;
    writer.flush()?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| BackupError::Io(format!("Failed to sync archive: {}", e)))?;

    Ok(count)
}

/// List member paths without extracting anything
pub fn list_members(archive_path: &Path) -> BackupResult<Vec<ArchiveMember>> {
    let mut archive = open(archive_path)?;
    let mut members = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let hard_link_target = if entry.header().entry_type().is_hard_link() {
            entry.link_name_bytes().map(|l| l.into_owned())
        } else {
            None
        };
        members.push(ArchiveMember {
            path: entry.path_bytes().into_owned(),
            hard_link_target,
            is_dir: entry.header().entry_type().is_dir(),
        });
    }

    Ok(members)
}

/// Unpack every member into `dest`, keeping recorded ownership and modes
///
/// Callers must run the archive through the validator first.
pub fn unpack(archive_path: &Path, dest: &Path) -> BackupResult<()> {
    let mut archive = open(archive_path)?;
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(true);
    archive.set_overwrite(true);

    archive.unpack(dest).map_err(|e| {
        BackupError::Io(format!(
            "Failed to extract {} into {}: {}",
            archive_path.display(),
            dest.display(),
            e
        ))
    })
}

fn open(archive_path: &Path) -> BackupResult<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive_path).map_err(|e| {
        BackupError::Io(format!("Failed to open {}: {}", archive_path.display(), e))
    })?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn partial_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}
