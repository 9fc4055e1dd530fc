//! Progress and completion sinks
//!
//! The pipeline never renders anything itself. It reports into a
//! [`ProgressSink`] while running and hands the terminal [`RunOutcome`] to a
//! [`CompletionSink`]. Channel senders implement both so a host can consume
//! everything as a [`PipelineEvent`] stream.

use tokio::sync::{broadcast, mpsc};
use zipfetch_types::{PhaseProgress, PipelineEvent, PipelineState, RunOutcome};

/// Receives progress reports and state transitions of a running pipeline
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &PhaseProgress);

    fn on_state(&self, _state: PipelineState) {}
}

/// Receives the terminal outcome of a run, exactly once
pub trait CompletionSink: Send + Sync {
    fn on_complete(&self, outcome: &RunOutcome);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _progress: &PhaseProgress) {}
}

impl CompletionSink for NullSink {
    fn on_complete(&self, _outcome: &RunOutcome) {}
}

// Send errors only mean nobody is listening any more.

impl ProgressSink for broadcast::Sender<PipelineEvent> {
    fn on_progress(&self, progress: &PhaseProgress) {
        let _ = self.send(PipelineEvent::Progress(progress.clone()));
    }

    fn on_state(&self, state: PipelineState) {
        let _ = self.send(PipelineEvent::StateChanged(state));
    }
}

impl CompletionSink for broadcast::Sender<PipelineEvent> {
    fn on_complete(&self, outcome: &RunOutcome) {
        let _ = self.send(PipelineEvent::Finished(outcome.clone()));
    }
}

impl ProgressSink for mpsc::UnboundedSender<PipelineEvent> {
    fn on_progress(&self, progress: &PhaseProgress) {
        let _ = self.send(PipelineEvent::Progress(progress.clone()));
    }

    fn on_state(&self, state: PipelineState) {
        let _ = self.send(PipelineEvent::StateChanged(state));
    }
}

impl CompletionSink for mpsc::UnboundedSender<PipelineEvent> {
    fn on_complete(&self, outcome: &RunOutcome) {
        let _ = self.send(PipelineEvent::Finished(outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipfetch_types::Phase;

    #[tokio::test]
    async fn test_broadcast_sink_forwards_events() {
        let (tx, mut rx) = broadcast::channel(16);

        tx.on_state(PipelineState::Downloading);
        tx.on_progress(&PhaseProgress::new(Phase::Download, 10, Some(20)));
        tx.on_complete(&RunOutcome::Succeeded { items_extracted: 2 });

        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::StateChanged(PipelineState::Downloading)
        ));
        match rx.recv().await.unwrap() {
            PipelineEvent::Progress(p) => assert_eq!(p.completed_units, 10),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::Finished(RunOutcome::Succeeded { items_extracted: 2 })
        ));
    }

    #[test]
    fn test_closed_channel_is_not_an_error() {
        let (tx, rx) = mpsc::unbounded_channel::<PipelineEvent>();
        drop(rx);
        tx.on_state(PipelineState::Extracting);
        tx.on_complete(&RunOutcome::Succeeded { items_extracted: 0 });
    }
}
