//! Step learning-rate schedule.

use crate::config::DatasetKind;
use serde::{Deserialize, Serialize};

/// Learning rate decayed by 10x at two milestones.
///
/// Both decay factors compound: `lr = base * 0.1^(epoch / a) * 0.1^(epoch / b)`
/// with integer division, so past the second milestone the first factor keeps
/// growing as well.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    /// Initial learning rate
    pub base_lr: f64,
    /// First decay milestone (epochs)
    pub first: u64,
    /// Second decay milestone (epochs)
    pub second: u64,
}

impl LrSchedule {
    pub fn new(base_lr: f64, first: u64, second: u64) -> Self {
        Self {
            base_lr,
            first,
            second,
        }
    }

    /// Standard schedule for a dataset: 150/225 on CIFAR, 30/60 on ImageNet.
    pub fn for_dataset(kind: DatasetKind, base_lr: f64) -> Self {
        match kind {
            DatasetKind::Cifar10 => Self::new(base_lr, 150, 225),
            DatasetKind::ImageNet => Self::new(base_lr, 30, 60),
        }
    }

    /// Learning rate to use for `epoch` (0-based).
    pub fn lr_at(&self, epoch: u64) -> f64 {
        let decays = epoch / self.first.max(1) + epoch / self.second.max(1);
        self.base_lr * 0.1f64.powi(decays as i32)
    }
}
