use crossbeam_channel::Sender;
use parking_lot::Mutex;
use soundbooth_foundation::BatchConsumer;
use std::sync::Arc;

use crate::frame::{Frame, FrameBatch};

/// Headroom of one sample: distance to full scale. `i16::MIN` saturates
/// to zero headroom.
fn headroom(sample: i16) -> i16 {
    let magnitude = sample.unsigned_abs().min(i16::MAX as u16);
    (i16::MAX as u16 - magnitude) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadroomReport {
    /// Smallest headroom observed in the last cycle, per channel.
    pub last_left: i16,
    pub last_right: i16,
    /// Running minimum across the analyzer's lifetime.
    pub worst_left: i16,
    pub worst_right: i16,
    /// Number of cycles that contained at least one near-full-scale
    /// sample. A cycle counts once regardless of how many samples clip.
    pub clipping_cycles: u64,
}

struct HeadroomState {
    worst_left: i16,
    worst_right: i16,
    clipping_cycles: u64,
}

/// Tracks per-cycle and worst-ever headroom and counts clipping cycles.
/// Hub invocations may overlap, so the running state sits behind a lock.
pub struct HeadroomAnalyzer {
    state: Mutex<HeadroomState>,
    output: Option<Sender<HeadroomReport>>,
}

impl HeadroomAnalyzer {
    pub fn new(output: Option<Sender<HeadroomReport>>) -> Self {
        Self {
            state: Mutex::new(HeadroomState {
                worst_left: i16::MAX,
                worst_right: i16::MAX,
                clipping_cycles: 0,
            }),
            output,
        }
    }

    fn analyze(&self, frames: &[Frame]) -> HeadroomReport {
        let mut last_left = i16::MAX;
        let mut last_right = i16::MAX;
        for frame in frames {
            last_left = last_left.min(headroom(frame.left));
            last_right = last_right.min(headroom(frame.right));
        }

        let mut state = self.state.lock();
        if last_left <= 1 || last_right <= 1 {
            state.clipping_cycles += 1;
        }
        state.worst_left = state.worst_left.min(last_left);
        state.worst_right = state.worst_right.min(last_right);

        HeadroomReport {
            last_left,
            last_right,
            worst_left: state.worst_left,
            worst_right: state.worst_right,
            clipping_cycles: state.clipping_cycles,
        }
    }
}

impl BatchConsumer<FrameBatch> for HeadroomAnalyzer {
    fn consume(&self, batch: Arc<FrameBatch>) {
        let report = self.analyze(&batch);
        if let Some(tx) = &self.output {
            let _ = tx.send(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(samples: &[(i16, i16)]) -> Vec<Frame> {
        samples
            .iter()
            .map(|&(left, right)| Frame { left, right })
            .collect()
    }

    #[test]
    fn quiet_batch_keeps_high_headroom() {
        let a = HeadroomAnalyzer::new(None);
        let report = a.analyze(&batch(&[(100, -200), (50, 25)]));
        assert_eq!(report.last_left, i16::MAX - 100);
        assert_eq!(report.last_right, i16::MAX - 200);
        assert_eq!(report.clipping_cycles, 0);
    }

    #[test]
    fn worst_is_monotonically_non_increasing() {
        let a = HeadroomAnalyzer::new(None);
        let mut prev_worst = i16::MAX;
        for loudness in [100i16, 30_000, 500, 32_000, 10] {
            let report = a.analyze(&batch(&[(loudness, 0)]));
            assert!(report.worst_left <= prev_worst);
            assert!(report.worst_left <= report.last_left);
            prev_worst = report.worst_left;
        }
        assert_eq!(prev_worst, i16::MAX - 32_000);
    }

    #[test]
    fn clipping_cycle_counts_once_per_batch() {
        let a = HeadroomAnalyzer::new(None);
        // Three clipping samples in one batch: counter moves by one.
        let report = a.analyze(&batch(&[(i16::MAX, 0), (i16::MIN, 0), (-i16::MAX, 0)]));
        assert_eq!(report.clipping_cycles, 1);

        // A near-full-scale sample (headroom exactly 1) still clips.
        let report = a.analyze(&batch(&[(0, i16::MAX - 1)]));
        assert_eq!(report.clipping_cycles, 2);

        // Headroom 2 does not.
        let report = a.analyze(&batch(&[(i16::MAX - 2, 0)]));
        assert_eq!(report.clipping_cycles, 2);
    }

    #[test]
    fn min_sample_saturates_to_zero_headroom() {
        assert_eq!(headroom(i16::MIN), 0);
        assert_eq!(headroom(i16::MAX), 0);
        assert_eq!(headroom(0), i16::MAX);
    }

    #[test]
    fn empty_batch_reports_full_headroom() {
        let a = HeadroomAnalyzer::new(None);
        let report = a.analyze(&[]);
        assert_eq!(report.last_left, i16::MAX);
        assert_eq!(report.last_right, i16::MAX);
        assert_eq!(report.clipping_cycles, 0);
    }

    #[test]
    fn report_is_emitted_to_the_sink() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let a = HeadroomAnalyzer::new(Some(tx));
        a.consume(Arc::new(batch(&[(1000, 1000)])));
        let report = rx.try_recv().unwrap();
        assert_eq!(report.last_left, i16::MAX - 1000);
    }
}
