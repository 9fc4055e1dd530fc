//! Windowed throughput measurement
//!
//! Both phases feed byte counts into their own sampler. A rate is only
//! produced once more than a second has passed since the previous one.

use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const MIN_WINDOW: Duration = Duration::from_secs(1);

/// Rate sampler over a monotonic elapsed clock supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct ThroughputSampler {
    /// Elapsed time at the last emitted sample
    window_start: Duration,
    /// Bytes recorded since the last emitted sample
    window_bytes: u64,
}

impl ThroughputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` transferred and, if the window is longer than a second,
    /// return the rate in MB/s and start a new window at `now`.
    pub fn sample(&mut self, now: Duration, bytes: u64) -> Option<f64> {
        self.window_bytes = self.window_bytes.saturating_add(bytes);

        let elapsed = now.saturating_sub(self.window_start);
        if elapsed <= MIN_WINDOW {
            return None;
        }

        let mbps = self.window_bytes as f64 / elapsed.as_secs_f64() / BYTES_PER_MB;
        self.window_start = now;
        self.window_bytes = 0;
        Some(mbps)
    }
}
