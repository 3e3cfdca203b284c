use crossbeam_channel::Sender;
use soundbooth_foundation::BatchConsumer;
use std::sync::Arc;

use crate::frame::FrameBatch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsReport {
    /// Linear RMS per channel, in [0, 1].
    pub rms_left: f64,
    pub rms_right: f64,
    /// 20 * log10(rms); negative infinity for silence.
    pub db_left: f64,
    pub db_right: f64,
}

fn to_db(rms: f64) -> f64 {
    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Computes linear and logarithmic RMS per channel for every batch. No
/// state is carried across cycles. Zero-length batches are skipped
/// rather than dividing by zero.
pub struct RmsAnalyzer {
    output: Option<Sender<RmsReport>>,
}

impl RmsAnalyzer {
    pub fn new(output: Option<Sender<RmsReport>>) -> Self {
        Self { output }
    }

    fn analyze(&self, frames: &FrameBatch) -> Option<RmsReport> {
        if frames.is_empty() {
            return None;
        }

        let mut sum_left = 0.0f64;
        let mut sum_right = 0.0f64;
        for frame in frames {
            let left = f64::from(frame.left) / f64::from(i16::MAX);
            sum_left += left * left;
            let right = f64::from(frame.right) / f64::from(i16::MAX);
            sum_right += right * right;
        }

        let n = frames.len() as f64;
        let rms_left = (sum_left / n).sqrt();
        let rms_right = (sum_right / n).sqrt();
        Some(RmsReport {
            rms_left,
            rms_right,
            db_left: to_db(rms_left),
            db_right: to_db(rms_right),
        })
    }
}

impl BatchConsumer<FrameBatch> for RmsAnalyzer {
    fn consume(&self, batch: Arc<FrameBatch>) {
        if let Some(report) = self.analyze(&batch) {
            if let Some(tx) = &self.output {
                let _ = tx.send(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn all_zero_batch_is_silent() {
        let a = RmsAnalyzer::new(None);
        let report = a
            .analyze(&vec![Frame { left: 0, right: 0 }; 64])
            .unwrap();
        assert_eq!(report.rms_left, 0.0);
        assert_eq!(report.rms_right, 0.0);
        assert_eq!(report.db_left, f64::NEG_INFINITY);
        assert_eq!(report.db_right, f64::NEG_INFINITY);
    }

    #[test]
    fn full_scale_square_wave_is_zero_db() {
        let a = RmsAnalyzer::new(None);
        let frames: Vec<Frame> = (0..128)
            .map(|i| {
                let s = if i % 2 == 0 { i16::MAX } else { -i16::MAX };
                Frame { left: s, right: s }
            })
            .collect();
        let report = a.analyze(&frames).unwrap();
        assert!((report.rms_left - 1.0).abs() < 1e-9);
        assert!(report.db_left.abs() < 1e-9);
    }

    #[test]
    fn half_scale_is_about_minus_six_db() {
        let a = RmsAnalyzer::new(None);
        let s = i16::MAX / 2;
        let frames = vec![Frame { left: s, right: -s }; 32];
        let report = a.analyze(&frames).unwrap();
        assert!((report.db_left - (-6.02)).abs() < 0.05);
        assert!((report.db_right - report.db_left).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_emits_nothing() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let a = RmsAnalyzer::new(Some(tx));
        a.consume(Arc::new(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channels_are_independent() {
        let a = RmsAnalyzer::new(None);
        let frames = vec![
            Frame {
                left: i16::MAX,
                right: 0,
            };
            16
        ];
        let report = a.analyze(&frames).unwrap();
        assert!((report.rms_left - 1.0).abs() < 1e-9);
        assert_eq!(report.rms_right, 0.0);
    }
}
