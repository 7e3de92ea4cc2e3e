//! Running counters for the voting engine

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of engine counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingMetrics {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_deferred: u64,
    pub ties: u64,
    /// Mean participation rate over closed sessions
    pub average_participation: f64,
    /// Mean time from open to close, in milliseconds
    pub average_time_to_close_ms: f64,
}

impl VotingMetrics {
    /// Fraction of closed sessions that were deferred
    pub fn deferral_rate(&self) -> f64 {
        if self.sessions_closed == 0 {
            0.0
        } else {
            self.sessions_deferred as f64 / self.sessions_closed as f64
        }
    }
}

#[derive(Default)]
struct Totals {
    metrics: VotingMetrics,
    participation_sum: f64,
    close_ms_sum: f64,
}

/// Thread-safe accumulator behind `VotingEngine::get_metrics`
#[derive(Default)]
pub struct MetricsRecorder {
    totals: Mutex<Totals>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_opened(&self) {
        if let Ok(mut t) = self.totals.lock() {
            t.metrics.sessions_opened += 1;
        }
    }

    /// Fold a closed session into the averages
    pub fn session_closed(&self, participation: f64, elapsed: Duration, deferred: bool, tie: bool) {
        if let Ok(mut t) = self.totals.lock() {
            t.metrics.sessions_closed += 1;
            if deferred {
                t.metrics.sessions_deferred += 1;
            }
            if tie {
                t.metrics.ties += 1;
            }
            t.participation_sum += participation;
            t.close_ms_sum += elapsed.as_secs_f64() * 1000.0;

            let closed = t.metrics.sessions_closed as f64;
            t.metrics.average_participation = t.participation_sum / closed;
            t.metrics.average_time_to_close_ms = t.close_ms_sum / closed;
        }
    }

    pub fn snapshot(&self) -> VotingMetrics {
        self.totals
            .lock()
            .map(|t| t.metrics.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_averages() {
        let recorder = MetricsRecorder::new();
        recorder.session_opened();
        recorder.session_opened();
        recorder.session_closed(1.0, Duration::from_millis(100), false, true);
        recorder.session_closed(0.5, Duration::from_millis(300), true, false);

        let m = recorder.snapshot();
        assert_eq!(m.sessions_opened, 2);
        assert_eq!(m.sessions_closed, 2);
        assert_eq!(m.sessions_deferred, 1);
        assert_eq!(m.ties, 1);
        assert!((m.average_participation - 0.75).abs() < 1e-9);
        assert!((m.average_time_to_close_ms - 200.0).abs() < 1e-6);
        assert!((m.deferral_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let m = MetricsRecorder::new().snapshot();
        assert_eq!(m, VotingMetrics::default());
        assert_eq!(m.deferral_rate(), 0.0);
    }
}
