//! Shared types for zipfetch
//!
//! This crate contains the data structures passed between the pipeline
//! core and whatever front end drives it (the CLI, or any other host that
//! renders progress).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

// ============================================================================
// Transfer Types
// ============================================================================

/// What a single pipeline run fetches and where it puts it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTarget {
    pub source_url: Url,
    pub archive_path: PathBuf,
    pub destination_dir: PathBuf,
    /// Hex-encoded SHA-256 the archive must match. When absent an existing
    /// archive is trusted as-is.
    #[serde(default)]
    pub expected_sha256: Option<String>,
}

impl TransferTarget {
    pub fn new(
        source_url: Url,
        archive_path: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_url,
            archive_path: archive_path.into(),
            destination_dir: destination_dir.into(),
            expected_sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.expected_sha256 = Some(digest.into().to_lowercase());
        self
    }
}

// ============================================================================
// Progress Types
// ============================================================================

/// One of the two sequential stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Download,
    Extract,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Download => write!(f, "download"),
            Phase::Extract => write!(f, "extract"),
        }
    }
}

/// A progress report for the running phase.
///
/// Units are bytes while downloading and entries while extracting. A missing
/// `total_units` means the total is unknown and the consumer should show an
/// activity indicator rather than a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub completed_units: u64,
    pub total_units: Option<u64>,
    pub throughput_mbps: Option<f64>,
    pub current_item: Option<String>,
}

impl PhaseProgress {
    pub fn new(phase: Phase, completed_units: u64, total_units: Option<u64>) -> Self {
        Self {
            phase,
            completed_units,
            total_units,
            throughput_mbps: None,
            current_item: None,
        }
    }

    pub fn with_throughput(mut self, mbps: Option<f64>) -> Self {
        self.throughput_mbps = mbps;
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.current_item = Some(item.into());
        self
    }

    /// Completed share of the phase, `0..=100`, or `None` when indeterminate
    pub fn percent(&self) -> Option<u8> {
        match self.total_units {
            Some(total) if total > 0 => {
                let pct = self.completed_units.saturating_mul(100) / total;
                Some(pct.min(100) as u8)
            }
            Some(_) => Some(100),
            None => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.total_units.is_none()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total_units, Some(total) if self.completed_units >= total)
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Run accepted, nothing touched yet
    Idle,
    EnsuringDestination,
    Downloading,
    Extracting,
    DeletingArchive,
    Completed,
    CleaningUp,
    Failed,
}

// ============================================================================
// Outcome Types
// ============================================================================

/// Category of the error that ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    FileSystem,
    Archive,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Network => "network error",
            ErrorKind::FileSystem => "file system error",
            ErrorKind::Archive => "archive error",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Terminal result of a run, delivered to the completion sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Succeeded { items_extracted: u64 },
    Failed { kind: ErrorKind, message: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RunOutcome::Succeeded { .. } => None,
            RunOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Succeeded { items_extracted } => {
                write!(f, "extracted {} entries", items_extracted)
            }
            RunOutcome::Failed { kind, message } => write!(f, "{}: {}", kind, message),
        }
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by the pipeline when it reports through a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PipelineEvent {
    Progress(PhaseProgress),
    StateChanged(PipelineState),
    Finished(RunOutcome),
}

// ============================================================================
// Settings Types
// ============================================================================

/// Tunables for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Largest slice written to the archive file per read
    pub chunk_size: usize,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Upper bound on the whole download phase. `None` waits forever.
    #[serde(default)]
    pub network_deadline_secs: Option<u64>,
    /// Minimum gap between progress events when the size is unknown
    pub indeterminate_interval_ms: u64,
}

impl Settings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn network_deadline(&self) -> Option<Duration> {
        self.network_deadline_secs.map(Duration::from_secs)
    }

    pub fn indeterminate_interval(&self) -> Duration {
        Duration::from_millis(self.indeterminate_interval_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024,
            user_agent: format!("zipfetch/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
            network_deadline_secs: None,
            indeterminate_interval_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_floors_and_caps() {
        let progress = PhaseProgress::new(Phase::Download, 999, Some(1000));
        assert_eq!(progress.percent(), Some(99));

        let progress = PhaseProgress::new(Phase::Download, 1000, Some(1000));
        assert_eq!(progress.percent(), Some(100));
        assert!(progress.is_complete());

        let progress = PhaseProgress::new(Phase::Download, 1500, Some(1000));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn test_percent_indeterminate() {
        let progress = PhaseProgress::new(Phase::Download, 4096, None);
        assert!(progress.is_indeterminate());
        assert_eq!(progress.percent(), None);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = RunOutcome::Failed {
            kind: ErrorKind::Network,
            message: "Server error: 404".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "network");

        let back: RunOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_target_normalizes_digest() {
        let url = Url::parse("https://example.com/master.zip").unwrap();
        let target = TransferTarget::new(url, "/tmp/master.zip", "/tmp/out").with_sha256("ABCDEF");
        assert_eq!(target.expected_sha256.as_deref(), Some("abcdef"));
    }
}
