//! Bounded-fanout directory layout keyed by node identity.
//!
//! Identity `n` lives at `<n / 100>/<n>.<ext>`, so each shard directory
//! holds at most [`SHARD_WIDTH`] entries.

use std::io;
use std::path::{Path, PathBuf};

pub const SHARD_WIDTH: u64 = 100;

/// Shard directory index for an identity.
pub fn shard_index(id: u64) -> u64 {
    id / SHARD_WIDTH
}

/// Relative path for `id` with `extension` (no leading dot). An empty
/// extension yields a bare `<shard>/<id>`.
pub fn shard_path(id: u64, extension: &str) -> PathBuf {
    let file_name = if extension.is_empty() {
        id.to_string()
    } else {
        format!("{}.{}", id, extension)
    };
    PathBuf::from(shard_index(id).to_string()).join(file_name)
}

/// Resolve the shard path under `root` and create its directory.
///
/// Directory creation is idempotent.
pub fn ensure_shard_path(root: &Path, id: u64, extension: &str) -> io::Result<PathBuf> {
    let path = root.join(shard_path(id, extension));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}
