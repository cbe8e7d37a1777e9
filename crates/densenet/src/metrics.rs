//! Running averages and accuracy.

use serde::{Deserialize, Serialize};

/// Tracks the latest value and the running average of a quantity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AverageMeter {
    pub val: f64,
    pub sum: f64,
    pub count: u64,
    pub avg: f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record `val` observed over `n` samples.
    pub fn update(&mut self, val: f64, n: u64) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        if self.count > 0 {
            self.avg = self.sum / self.count as f64;
        }
    }
}

/// Averages over one pass of a data split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Mean cross-entropy loss
    pub loss: f64,
    /// Top-1 precision in percent
    pub prec1: f64,
}

/// Top-1 precision of `logits` against `targets`, in percent.
#[cfg(feature = "torch")]
pub fn accuracy(logits: &tch::Tensor, targets: &tch::Tensor) -> f64 {
    logits.accuracy_for_logits(targets).double_value(&[]) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_meter_weights_by_count() {
        let mut meter = AverageMeter::new();
        meter.update(1.0, 3);
        meter.update(3.0, 1);

        assert_eq!(meter.val, 3.0);
        assert_eq!(meter.count, 4);
        assert!((meter.avg - 1.5).abs() < 1e-12);

        meter.reset();
        assert_eq!(meter, AverageMeter::default());
    }

    #[test]
    fn test_zero_count_update() {
        let mut meter = AverageMeter::new();
        meter.update(5.0, 0);
        assert_eq!(meter.avg, 0.0);
        assert_eq!(meter.val, 5.0);
    }

    #[cfg(feature = "torch")]
    #[test]
    fn test_accuracy_percent() {
        use tch::Tensor;

        let logits = Tensor::from_slice(&[2.0f32, 1.0, 0.0, 3.0, 5.0, 1.0, 0.0, 1.0]).view([4, 2]);
        let targets = Tensor::from_slice(&[0i64, 1, 1, 1]);
        assert!((accuracy(&logits, &targets) - 75.0).abs() < 1e-6);
    }
}
