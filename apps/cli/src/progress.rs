//! Progress bars for a pipeline run

use crate::output::format_rate;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use zipfetch_core::{CompletionSink, ProgressSink};
use zipfetch_types::{ErrorKind, Phase, PhaseProgress, PipelineState, RunOutcome};

const DOWNLOAD_TEMPLATE: &str = "{prefix:>8.bold} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}";
const SPINNER_TEMPLATE: &str = "{prefix:>8.bold} {spinner:.green} [{elapsed_precise}] {bytes} {msg}";
const EXTRACT_TEMPLATE: &str = "{prefix:>8.bold} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

/// One bar per phase, created when the phase first reports
pub struct FetchProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<Phase, ProgressBar>>,
}

impl FetchProgress {
    /// Bars are drawn to stdout when `visible`, otherwise swallowed
    pub fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar_for(&self, progress: &PhaseProgress) -> ProgressBar {
        let mut bars = self.bars.lock();
        bars.entry(progress.phase)
            .or_insert_with(|| {
                let pb = match progress.total_units {
                    Some(total) => self.multi.add(ProgressBar::new(total)),
                    None => {
                        let pb = self.multi.add(ProgressBar::new_spinner());
                        pb.enable_steady_tick(Duration::from_millis(100));
                        pb
                    }
                };
                pb.set_style(bar_style(progress.phase, progress.is_indeterminate()));
                pb.set_prefix(progress.phase.to_string());
                pb
            })
            .clone()
    }

    fn finish_phase(&self, phase: Phase) {
        if let Some(pb) = self.bars.lock().get(&phase) {
            if !pb.is_finished() {
                pb.finish_with_message(format!("{}", style("✓").green().bold()));
            }
        }
    }
}

impl ProgressSink for FetchProgress {
    fn on_progress(&self, progress: &PhaseProgress) {
        let pb = self.bar_for(progress);

        if let Some(total) = progress.total_units {
            pb.set_length(total);
        }
        pb.set_position(progress.completed_units);

        match progress.phase {
            Phase::Download => {
                if let Some(rate) = progress.throughput_mbps {
                    pb.set_message(format_rate(rate));
                }
            }
            Phase::Extract => {
                if let Some(item) = &progress.current_item {
                    pb.set_message(item.clone());
                }
            }
        }

        if progress.is_complete() {
            pb.finish_with_message(format!("{}", style("✓").green().bold()));
        }
    }

    fn on_state(&self, state: PipelineState) {
        debug!("Pipeline state: {:?}", state);

        // An unknown-length download never reports a total
        if state == PipelineState::Extracting {
            self.finish_phase(Phase::Download);
        }
    }
}

impl CompletionSink for FetchProgress {
    fn on_complete(&self, outcome: &RunOutcome) {
        let bars = self.bars.lock();
        for pb in bars.values().filter(|pb| !pb.is_finished()) {
            match outcome {
                RunOutcome::Succeeded { .. } => pb.finish(),
                RunOutcome::Failed {
                    kind: ErrorKind::Cancelled,
                    ..
                } => pb.abandon_with_message(format!("{} Cancelled", style("○").dim())),
                RunOutcome::Failed { kind, .. } => {
                    pb.abandon_with_message(format!("{} {}", style("✗").red().bold(), kind))
                }
            }
        }
    }
}

fn bar_style(phase: Phase, indeterminate: bool) -> ProgressStyle {
    let template = match (phase, indeterminate) {
        (Phase::Download, false) => DOWNLOAD_TEMPLATE,
        (Phase::Download, true) => SPINNER_TEMPLATE,
        (Phase::Extract, _) => EXTRACT_TEMPLATE,
    };

    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}
