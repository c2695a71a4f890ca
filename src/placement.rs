//! Physical placement of file content on a storage device.
//!
//! Runs only after the graph has committed. Moving is idempotent: when the
//! destination already holds the expected content the move counts as done,
//! so an interrupted placement can simply be run again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filebase_core::hash::fingerprint_file;
use filebase_core::models::{FileRecord, Layout, NodeId};
use filebase_core::shard::shard_path;
use filebase_core::CatalogError;

/// What [`place_file`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Renamed within one filesystem.
    Renamed,
    /// Copied across filesystems, then the source removed.
    Copied,
    /// The destination already held the content.
    AlreadyPlaced,
}

/// Where a File's content lives on a device rooted at `device_path`,
/// following the layout recorded on the file.
pub fn stored_path(device_path: &Path, id: NodeId, file: &FileRecord) -> PathBuf {
    match file.layout {
        Layout::Fingerprint => device_path.join(&file.fingerprint),
        Layout::Sharded => device_path.join(shard_path(id.0.unsigned_abs(), &file.extension)),
    }
}

fn io_failure(what: &str, path: &Path, err: io::Error) -> CatalogError {
    CatalogError::IoFailure(format!("{} {}: {}", what, path.display(), err))
}

/// Move `source` to `dest`, which must end up holding content `fingerprint`.
///
/// Tries an atomic rename first and falls back to copy + remove when the
/// two paths are on different devices. An occupied destination with other
/// content is an error; nothing is overwritten.
pub fn place_file(source: &Path, dest: &Path, fingerprint: &str) -> Result<Placement, CatalogError> {
    if dest.exists() {
        let existing = fingerprint_file(dest).map_err(|e| io_failure("hash", dest, e))?;
        if existing != fingerprint {
            return Err(CatalogError::IoFailure(format!(
                "destination {} holds different content ({})",
                dest.display(),
                existing
            )));
        }
        if source.exists() && source != dest {
            fs::remove_file(source).map_err(|e| io_failure("remove", source, e))?;
        }
        return Ok(Placement::AlreadyPlaced);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_failure("create", parent, e))?;
    }

    match fs::rename(source, dest) {
        Ok(()) => return Ok(Placement::Renamed),
        Err(e) if !source.exists() => return Err(io_failure("move", source, e)),
        Err(e) => {
            tracing::debug!(error = %e, "rename failed, falling back to copy");
        }
    }

    // Copy under a temporary name so a half-written file never sits at
    // the final path.
    let partial = dest.with_extension("partial");
    fs::copy(source, &partial).map_err(|e| io_failure("copy", source, e))?;
    let copied = fingerprint_file(&partial).map_err(|e| io_failure("hash", &partial, e))?;
    if copied != fingerprint {
        let _ = fs::remove_file(&partial);
        return Err(CatalogError::IoFailure(format!(
            "copy of {} does not match fingerprint {}",
            source.display(),
            fingerprint
        )));
    }
    fs::rename(&partial, dest).map_err(|e| io_failure("rename", &partial, e))?;
    fs::remove_file(source).map_err(|e| io_failure("remove", source, e))?;
    Ok(Placement::Copied)
}

/// Copy stored content out to `dest` without touching the original.
pub fn copy_out(stored: &Path, dest: &Path) -> Result<(), CatalogError> {
    if !stored.exists() {
        return Err(CatalogError::IoFailure(format!(
            "stored content missing at {}",
            stored.display()
        )));
    }
    if dest.exists() {
        return Err(CatalogError::IoFailure(format!(
            "{} already exists",
            dest.display()
        )));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_failure("create", parent, e))?;
    }
    fs::copy(stored, dest).map_err(|e| io_failure("copy", stored, e))?;
    Ok(())
}
