//! Streaming download of the archive
//!
//! The response body is written straight to the archive path as it
//! arrives. Network chunks are split into slices of at most
//! `Settings::chunk_size` bytes; cancellation is checked before every slice
//! and while waiting on the network.

use crate::error::FetchError;
use crate::sink::ProgressSink;
use crate::throughput::ThroughputSampler;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use zipfetch_types::{Phase, PhaseProgress, Settings};

/// HTTP downloader for a single archive
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    chunk_size: usize,
    indeterminate_interval: Duration,
}

impl Downloader {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .connect_timeout(settings.connect_timeout())
            .build()?;

        Ok(Self::with_client(client, settings))
    }

    /// Build a downloader around an existing client
    pub fn with_client(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            chunk_size: settings.chunk_size.max(1),
            indeterminate_interval: settings.indeterminate_interval(),
        }
    }

    /// Stream `url` into `dest`, replacing any file already there.
    ///
    /// Returns the number of bytes written.
    pub async fn download(
        &self,
        url: &Url,
        dest: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        info!("Downloading {} to {:?}", url, dest);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.get(url.as_str()).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        // A zero length tells us nothing useful, treat it as unknown
        let total = response.content_length().filter(|len| *len > 0);
        debug!("Response {} for {}, content length {:?}", status, url, total);

        let mut file = fs_err::tokio::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut progress = ByteProgress::new(total, self.indeterminate_interval);
        let started = Instant::now();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    file.flush().await?;
                    info!("Download of {} cancelled after {} bytes", url, progress.written());
                    return Err(FetchError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };

            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            for piece in chunk.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    file.flush().await?;
                    info!("Download of {} cancelled after {} bytes", url, progress.written());
                    return Err(FetchError::Cancelled);
                }

                file.write_all(piece).await?;

                if let Some(update) = progress.advance(piece.len() as u64, started.elapsed()) {
                    sink.on_progress(&update);
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(update) = progress.finish() {
            sink.on_progress(&update);
        }

        info!("Downloaded {} bytes from {}", progress.written(), url);
        Ok(progress.written())
    }
}

/// Decides which byte counts become progress events.
///
/// Known sizes report whenever the whole percentage moves or a new rate is
/// available. Unknown sizes report on a fixed interval and never carry a
/// rate.
#[derive(Debug)]
struct ByteProgress {
    total: Option<u64>,
    written: u64,
    last_percent: Option<u8>,
    last_reported: Option<u64>,
    last_report_at: Option<Duration>,
    interval: Duration,
    sampler: ThroughputSampler,
}

impl ByteProgress {
    fn new(total: Option<u64>, interval: Duration) -> Self {
        Self {
            total,
            written: 0,
            last_percent: None,
            last_reported: None,
            last_report_at: None,
            interval,
            sampler: ThroughputSampler::new(),
        }
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn advance(&mut self, bytes: u64, now: Duration) -> Option<PhaseProgress> {
        self.written = self.written.saturating_add(bytes);

        let update = match self.total {
            Some(total) => {
                let rate = self.sampler.sample(now, bytes);
                let update =
                    PhaseProgress::new(Phase::Download, self.written, Some(total)).with_throughput(rate);
                let percent = update.percent();
                if percent == self.last_percent && rate.is_none() {
                    return None;
                }
                self.last_percent = percent;
                update
            }
            None => {
                let due = self
                    .last_report_at
                    .map_or(true, |at| now.saturating_sub(at) >= self.interval);
                if !due {
                    return None;
                }
                PhaseProgress::new(Phase::Download, self.written, None)
            }
        };

        self.last_reported = Some(self.written);
        self.last_report_at = Some(now);
        Some(update)
    }

    /// Final report carrying the full byte count, unless it was already sent
    fn finish(&mut self) -> Option<PhaseProgress> {
        if self.last_reported == Some(self.written) {
            return None;
        }
        self.last_reported = Some(self.written);
        Some(PhaseProgress::new(Phase::Download, self.written, self.total))
    }
}
