//! zipfetch Core - Download-then-extract pipeline
//!
//! This crate fetches a zip archive over HTTP, unpacks it into a destination
//! directory and reports progress for both phases. A failed run never leaves
//! a half-downloaded archive or a half-populated destination behind.

mod cleanup;
mod download;
mod error;
mod extract;
mod sink;
mod throughput;
mod verify;

pub use cleanup::*;
pub use download::*;
pub use error::*;
pub use extract::*;
pub use sink::*;
pub use throughput::*;
pub use verify::*;

pub use tokio_util::sync::CancellationToken;

use tracing::{error, info, warn};
use zipfetch_types::{PipelineState, RunOutcome, Settings, TransferTarget};

/// Drives one transfer through destination setup, download, extraction and
/// archive removal, cleaning up after any failure.
#[derive(Debug, Clone)]
pub struct Pipeline {
    downloader: Downloader,
    settings: Settings,
}

impl Pipeline {
    /// Create a pipeline with its own HTTP client
    pub fn new(settings: Settings) -> Result<Self, FetchError> {
        let downloader = Downloader::new(&settings)?;
        Ok(Self {
            downloader,
            settings,
        })
    }

    /// Run the whole pipeline for `target`.
    ///
    /// The outcome goes to `completion` and is also returned.
    pub async fn run(
        &self,
        target: &TransferTarget,
        progress: &dyn ProgressSink,
        completion: &dyn CompletionSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!(
            "Starting run: {} -> {:?}",
            target.source_url, target.destination_dir
        );
        progress.on_state(PipelineState::Idle);

        let outcome = match self.execute(target, progress, cancel).await {
            Ok(summary) => {
                progress.on_state(PipelineState::Completed);
                info!(
                    "Run completed: {} entries extracted into {:?}",
                    summary.entries, target.destination_dir
                );
                RunOutcome::Succeeded {
                    items_extracted: summary.entries,
                }
            }
            Err(e) => {
                error!("Run for {} failed: {}", target.source_url, e);
                progress.on_state(PipelineState::CleaningUp);
                cleanup(&target.archive_path, &target.destination_dir).await;
                progress.on_state(PipelineState::Failed);
                RunOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };

        completion.on_complete(&outcome);
        outcome
    }

    async fn execute(
        &self,
        target: &TransferTarget,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ExtractSummary, FetchError> {
        ensure_active(cancel)?;
        progress.on_state(PipelineState::EnsuringDestination);
        fs_err::tokio::create_dir_all(&target.destination_dir).await?;

        ensure_active(cancel)?;
        if self.needs_download(target).await? {
            progress.on_state(PipelineState::Downloading);
            self.download(target, progress, cancel).await?;

            if let Some(expected) = &target.expected_sha256 {
                verify_sha256(&target.archive_path, expected).await?;
            }
        } else {
            info!(
                "Archive {:?} already present, skipping download",
                target.archive_path
            );
        }

        ensure_active(cancel)?;
        progress.on_state(PipelineState::Extracting);
        let summary = extract(
            &target.archive_path,
            &target.destination_dir,
            progress,
            cancel,
        )
        .await?;

        // The run has succeeded at this point, a stale archive is only noise
        progress.on_state(PipelineState::DeletingArchive);
        if !remove_archive(&target.archive_path).await {
            warn!(
                "Archive {:?} could not be deleted after extraction",
                target.archive_path
            );
        }

        Ok(summary)
    }

    /// Whether the archive has to be fetched.
    ///
    /// An archive already on disk is reused. With an expected digest it is
    /// checked first and thrown away on mismatch.
    async fn needs_download(&self, target: &TransferTarget) -> Result<bool, FetchError> {
        if !tokio::fs::try_exists(&target.archive_path).await? {
            return Ok(true);
        }

        let Some(expected) = &target.expected_sha256 else {
            return Ok(false);
        };

        match verify_sha256(&target.archive_path, expected).await {
            Ok(()) => Ok(false),
            Err(FetchError::ChecksumMismatch { actual, .. }) => {
                warn!(
                    "Existing archive {:?} has digest {}, downloading again",
                    target.archive_path, actual
                );
                fs_err::tokio::remove_file(&target.archive_path).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Download with the optional deadline applied.
    ///
    /// An expired deadline cancels the downloader and waits for it to stop,
    /// so no file operation is still in flight when cleanup runs.
    async fn download(
        &self,
        target: &TransferTarget,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let Some(deadline) = self.settings.network_deadline() else {
            return self
                .downloader
                .download(&target.source_url, &target.archive_path, progress, cancel)
                .await;
        };

        let scoped = cancel.child_token();
        let download =
            self.downloader
                .download(&target.source_url, &target.archive_path, progress, &scoped);
        tokio::pin!(download);

        tokio::select! {
            result = &mut download => result,
            _ = tokio::time::sleep(deadline) => {
                warn!("Download of {} exceeded {:?}, stopping", target.source_url, deadline);
                scoped.cancel();
                match download.await {
                    Err(FetchError::Cancelled) if !cancel.is_cancelled() => {
                        Err(FetchError::Timeout(deadline))
                    }
                    other => other,
                }
            }
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), FetchError> {
    if cancel.is_cancelled() {
        Err(FetchError::Cancelled)
    } else {
        Ok(())
    }
}
