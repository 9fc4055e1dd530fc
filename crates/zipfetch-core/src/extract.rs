//! Zip extraction
//!
//! Entries are materialized in the archive's own order. Extraction itself is
//! blocking work, so [`extract`] moves it onto tokio's blocking pool and
//! relays per-entry progress back over a channel.

use crate::error::FetchError;
use crate::sink::ProgressSink;
use crate::throughput::ThroughputSampler;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zip::ZipArchive;
use zipfetch_types::{Phase, PhaseProgress};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// What an extraction produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Every entry processed, directory markers included
    pub entries: u64,
    pub files: u64,
    pub directories: u64,
    /// Decompressed bytes written
    pub bytes: u64,
}

/// Extract `archive_path` into `dest_dir` without blocking the async runtime.
pub async fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<ExtractSummary, FetchError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    let cancel = cancel.clone();

    let worker = tokio::task::spawn_blocking(move || {
        let mut report = |progress: PhaseProgress| {
            let _ = tx.send(progress);
        };
        extract_archive(&archive_path, &dest_dir, &mut report, &cancel)
    });

    // Ends once the worker drops its sender
    while let Some(progress) = rx.recv().await {
        sink.on_progress(&progress);
    }

    worker
        .await
        .map_err(|e| FetchError::Worker(format!("extraction task failed: {}", e)))?
}

/// Blocking extraction of a zip archive.
///
/// `report` is called once per entry, directory markers included, so the
/// completed count always ends at the archive's entry count.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    report: &mut dyn FnMut(PhaseProgress),
    cancel: &CancellationToken,
) -> Result<ExtractSummary, FetchError> {
    let file = fs_err::File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let total = archive.len() as u64;
    info!("Extracting {} entries from {:?} into {:?}", total, archive_path, dest_dir);

    let started = Instant::now();
    let mut sampler = ThroughputSampler::new();
    let mut summary = ExtractSummary::default();

    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            info!("Extraction cancelled after {} of {} entries", index, total);
            return Err(FetchError::Cancelled);
        }

        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| FetchError::UnsafeEntryPath(name.clone()))?;
        let target = dest_dir.join(relative);

        let written = if is_directory_marker(&name) {
            fs_err::create_dir_all(&target)?;
            summary.directories += 1;
            0
        } else {
            if let Some(parent) = target.parent() {
                fs_err::create_dir_all(parent)?;
            }
            let mode = entry.unix_mode();
            let written = copy_entry(&mut entry, &target, &name, cancel)?;
            apply_mode(&target, mode)?;
            summary.files += 1;
            written
        };

        summary.bytes += written;
        summary.entries += 1;
        debug!("Extracted {} ({} bytes)", name, written);

        let rate = sampler.sample(started.elapsed(), written);
        report(
            PhaseProgress::new(Phase::Extract, summary.entries, Some(total))
                .with_throughput(rate)
                .with_item(name),
        );
    }

    info!(
        "Extracted {} files and {} directories ({} bytes)",
        summary.files, summary.directories, summary.bytes
    );
    Ok(summary)
}

/// An entry whose last path component is empty is a folder placeholder
pub fn is_directory_marker(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}

/// Copy one entry to disk, overwriting whatever is at `target`.
///
/// Read failures come from decompression and are reported against the
/// archive; write failures are plain IO errors.
fn copy_entry(
    entry: &mut impl Read,
    target: &Path,
    name: &str,
    cancel: &CancellationToken,
) -> Result<u64, FetchError> {
    let mut out = fs_err::File::create(target)?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let n = match entry.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FetchError::EntryRead {
                    entry: name.to_string(),
                    source,
                })
            }
        };

        out.write_all(&buffer[..n])?;
        written += n as u64;
    }

    out.flush()?;
    Ok(written)
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> Result<(), FetchError> {
    use std::os::unix::fs::PermissionsExt;

    // Only carry over permission bits that keep the file readable to us
    if let Some(mode) = mode.map(|m| m & 0o777).filter(|m| m & 0o600 == 0o600) {
        fs_err::set_permissions(target, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> Result<(), FetchError> {
    Ok(())
}
