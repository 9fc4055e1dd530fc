//! SHA-256 verification of the local archive

use crate::error::FetchError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 of the file at `path`
pub async fn sha256_file(path: &Path) -> Result<String, FetchError> {
    let mut file = fs_err::tokio::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fail with [`FetchError::ChecksumMismatch`] unless `path` hashes to `expected`
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<(), FetchError> {
    let actual = sha256_file(path).await?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
