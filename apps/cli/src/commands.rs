//! CLI command implementations

use crate::output::{format_bytes, print_output};
use crate::progress::FetchProgress;
use crate::{FetchArgs, OutputFormat};
use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use url::Url;
use zipfetch_core::{cleanup, CancellationToken, Pipeline};
use zipfetch_types::{ErrorKind, RunOutcome, Settings, TransferTarget};

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

const FALLBACK_ARCHIVE_NAME: &str = "archive.zip";

pub async fn fetch(args: FetchArgs, format: OutputFormat) -> Result<ExitCode> {
    let settings = settings_from(&args);
    let archive = args
        .archive
        .clone()
        .unwrap_or_else(|| default_archive_path(&args.url, &args.dest));

    let mut target = TransferTarget::new(args.url.clone(), archive, args.dest.clone());
    if let Some(digest) = args.sha256 {
        target = target.with_sha256(digest);
    }
    debug!("Resolved target: {:?}", target);

    let pipeline = Pipeline::new(settings)?;
    let progress = FetchProgress::new(format == OutputFormat::Human);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                cancel.cancel();
            }
        })
    };

    let outcome = pipeline.run(&target, &progress, &progress, &cancel).await;
    interrupt.abort();

    match format {
        OutputFormat::Json => print_output(&outcome, format)?,
        OutputFormat::Human => match &outcome {
            RunOutcome::Succeeded { items_extracted } => {
                println!(
                    "{} Extracted {} entries into {}",
                    style("✓").green().bold(),
                    style(items_extracted).bold(),
                    style(target.destination_dir.display()).cyan()
                );
            }
            RunOutcome::Failed { kind, message } => {
                eprintln!(
                    "{} {}: {}",
                    style("✗").red().bold(),
                    kind,
                    message
                );
            }
        },
    }

    Ok(exit_code(&outcome))
}

pub async fn clean(archive: &Path, dest: &Path, format: OutputFormat) -> Result<()> {
    let archive_size = tokio::fs::metadata(archive).await.ok().map(|m| m.len());
    let dest_existed = tokio::fs::try_exists(dest).await.unwrap_or(false);

    cleanup(archive, dest).await;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "archive": archive,
                "destination": dest,
                "archive_exists": archive.exists(),
                "destination_exists": dest.exists(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human => {
            for line in removal_lines(archive, archive_size, dest, dest_existed) {
                println!("{} {}", style("✓").green().bold(), line);
            }
        }
    }

    Ok(())
}

/// What `clean` reports as removed; paths that were never there are skipped
fn removal_lines(
    archive: &Path,
    archive_size: Option<u64>,
    dest: &Path,
    dest_existed: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(size) = archive_size.filter(|_| !archive.exists()) {
        lines.push(format!("Removed {} ({})", archive.display(), format_bytes(size)));
    }
    if dest_existed && !dest.exists() {
        lines.push(format!("Removed {}", dest.display()));
    }
    if lines.is_empty() {
        lines.push("Nothing to remove".to_string());
    }
    lines
}

fn settings_from(args: &FetchArgs) -> Settings {
    let defaults = Settings::default();
    Settings {
        chunk_size: args.chunk_size.unwrap_or(defaults.chunk_size),
        connect_timeout_secs: args.connect_timeout.unwrap_or(defaults.connect_timeout_secs),
        network_deadline_secs: args.timeout.or(defaults.network_deadline_secs),
        ..defaults
    }
}

/// The URL's last path segment, placed beside the destination folder
fn default_archive_path(url: &Url, dest: &Path) -> PathBuf {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(FALLBACK_ARCHIVE_NAME);

    match dest.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome.error_kind() {
        None => ExitCode::SUCCESS,
        Some(ErrorKind::Cancelled) => ExitCode::from(EXIT_INTERRUPTED),
        Some(_) => ExitCode::FAILURE,
    }
}
