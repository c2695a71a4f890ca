//! Content fingerprinting.
//!
//! Fingerprints are lowercase hex SHA-256 digests of a file's bytes. Input is
//! read in fixed-size chunks, so memory use does not grow with file size.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read buffer size for hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash everything readable from `reader`.
///
/// Read errors propagate; `Interrupted` reads are retried.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash the file at `path`.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

/// Hash an in-memory buffer.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
