//! SHA256 fingerprinting of file content.
//!
//! Files are streamed through the hasher in fixed-size chunks so memory use
//! stays bounded regardless of file size.

use crate::error::ProtectorError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read per chunk while hashing
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Hex-encoded SHA256 digest of a file's full content
pub type Fingerprint = String;

/// Calculate the SHA256 fingerprint of the file at `path`.
///
/// Open and read failures are returned, never swallowed.
pub fn compute_fingerprint(path: &Path) -> Result<Fingerprint, ProtectorError> {
    let wrap = |source| ProtectorError::Fingerprint {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(wrap)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(wrap)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint of in-memory bytes, same encoding as [`compute_fingerprint`]
pub fn fingerprint_bytes(content: &[u8]) -> Fingerprint {
    hex::encode(Sha256::digest(content))
}
