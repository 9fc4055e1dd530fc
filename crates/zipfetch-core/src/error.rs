//! Error types for zipfetch core

use std::time::Duration;
use thiserror::Error;
use zipfetch_types::ErrorKind;

/// Errors that can occur while fetching or unpacking an archive
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Download did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to read archive entry {entry}: {source}")]
    EntryRead {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive entry escapes the destination: {0}")]
    UnsafeEntryPath(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Background worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    /// Category reported in a failed run outcome
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network(_)
            | FetchError::ServerError { .. }
            | FetchError::Timeout(_)
            | FetchError::InvalidUrl(_) => ErrorKind::Network,
            FetchError::Io(_) | FetchError::Worker(_) => ErrorKind::FileSystem,
            FetchError::Archive(_)
            | FetchError::EntryRead { .. }
            | FetchError::UnsafeEntryPath(_)
            | FetchError::ChecksumMismatch { .. } => ErrorKind::Archive,
            FetchError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
