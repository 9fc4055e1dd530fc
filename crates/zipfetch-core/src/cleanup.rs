//! Removal of partial artifacts after a failed run
//!
//! Cleanup runs while another error is already on its way to the caller,
//! so nothing here is allowed to fail. Problems are logged and dropped.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Delete the archive file and the destination tree if they exist.
///
/// Safe to call any number of times.
pub async fn cleanup(archive_path: &Path, destination_dir: &Path) {
    remove_archive(archive_path).await;

    match fs::remove_dir_all(destination_dir).await {
        Ok(()) => debug!("Removed destination {:?}", destination_dir),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove destination {:?}: {}", destination_dir, e),
    }
}

/// Delete the archive file, logging instead of failing.
///
/// Returns whether the file is gone afterwards.
pub async fn remove_archive(archive_path: &Path) -> bool {
    match fs::remove_file(archive_path).await {
        Ok(()) => {
            debug!("Removed archive {:?}", archive_path);
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove archive {:?}: {}", archive_path, e);
            false
        }
    }
}
