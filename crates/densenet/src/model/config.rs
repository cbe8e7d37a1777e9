//! Architecture description of DenseNet-BC.

use crate::{DenseNetError, Result};
use serde::{Deserialize, Serialize};

/// Layout family of the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// 32x32 inputs: 3x3 stem, three dense blocks
    Cifar,
    /// 224x224 inputs: 7x7/2 stem with max pooling, four dense blocks
    ImageNet,
}

impl Variant {
    pub fn num_blocks(self) -> i64 {
        match self {
            Variant::Cifar => 3,
            Variant::ImageNet => 4,
        }
    }

}

/// Configuration for a DenseNet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseNetConfig {
    /// Total depth
    pub depth: i64,
    /// Output classes
    pub num_classes: i64,
    /// Channels added by each dense layer (k)
    pub growth_rate: i64,
    /// Channel compression in transitions
    pub reduction: f64,
    /// Use 1x1 bottleneck before every 3x3 conv
    pub bottleneck: bool,
    /// Dropout probability after every conv
    pub drop_rate: f64,
    pub variant: Variant,
}

impl Default for DenseNetConfig {
    fn default() -> Self {
        Self {
            depth: 100,
            num_classes: 10,
            growth_rate: 12,
            reduction: 0.5,
            bottleneck: true,
            drop_rate: 0.0,
            variant: Variant::Cifar,
        }
    }
}

/// One dense block followed by an optional transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagePlan {
    /// Channels entering the dense block
    pub in_channels: i64,
    /// Dense layers in the block
    pub num_layers: i64,
    /// Channels leaving the dense block
    pub block_channels: i64,
    /// Channels leaving the transition, if the stage has one
    pub transition_channels: Option<i64>,
}

/// Channel bookkeeping for a whole network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchitecturePlan {
    pub stem_channels: i64,
    pub stages: Vec<StagePlan>,
    pub feature_channels: i64,
    pub num_classes: i64,
}

impl DenseNetConfig {
    /// Whether `other` builds the same weight tensors.
    ///
    /// Dropout carries no parameters, so `drop_rate` is ignored.
    pub fn same_weights_as(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.num_classes == other.num_classes
            && self.growth_rate == other.growth_rate
            && self.reduction == other.reduction
            && self.bottleneck == other.bottleneck
            && self.variant == other.variant
    }

    pub fn validate(&self) -> Result<()> {
        if self.growth_rate <= 0 {
            return Err(DenseNetError::Config(format!(
                "growth rate must be positive, got {}",
                self.growth_rate
            )));
        }
        if self.num_classes <= 0 {
            return Err(DenseNetError::Config(format!(
                "number of classes must be positive, got {}",
                self.num_classes
            )));
        }
        if !(self.reduction > 0.0 && self.reduction <= 1.0) {
            return Err(DenseNetError::Config(format!(
                "reduction must be in (0, 1], got {}",
                self.reduction
            )));
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(DenseNetError::Config(format!(
                "drop rate must be in [0, 1), got {}",
                self.drop_rate
            )));
        }
        self.layers_per_block().map(|_| ())
    }

    /// Dense layers in every block.
    ///
    /// `depth - 4` layers are spread evenly over the blocks; with bottlenecks
    /// every dense layer counts as two.
    pub fn layers_per_block(&self) -> Result<i64> {
        let blocks = self.variant.num_blocks();
        let body = self.depth - 4;
        let divisor = if self.bottleneck { blocks * 2 } else { blocks };
        if body <= 0 || body % divisor != 0 {
            return Err(DenseNetError::Config(format!(
                "depth {} does not split into {} {} blocks (depth - 4 must be a positive multiple of {})",
                self.depth,
                blocks,
                if self.bottleneck { "bottleneck" } else { "basic" },
                divisor
            )));
        }
        Ok(body / divisor)
    }

    pub fn plan(&self) -> Result<ArchitecturePlan> {
        self.validate()?;
        let n = self.layers_per_block()?;
        let blocks = self.variant.num_blocks();

        let stem_channels = 2 * self.growth_rate;
        let mut channels = stem_channels;
        let mut stages = Vec::with_capacity(blocks as usize);
        for i in 0..blocks {
            let in_channels = channels;
            channels += n * self.growth_rate;
            let block_channels = channels;
            let transition_channels = if i + 1 < blocks {
                channels = (channels as f64 * self.reduction).floor() as i64;
                Some(channels)
            } else {
                None
            };
            stages.push(StagePlan {
                in_channels,
                num_layers: n,
                block_channels,
                transition_channels,
            });
        }

        Ok(ArchitecturePlan {
            stem_channels,
            stages,
            feature_channels: channels,
            num_classes: self.num_classes,
        })
    }

    /// Exact number of trainable parameters.
    pub fn parameter_count(&self) -> Result<u64> {
        let plan = self.plan()?;
        let k = self.growth_rate;
        let bn = |c: i64| 2 * c;

        let mut total = match self.variant {
            Variant::Cifar => 3 * 3 * 3 * plan.stem_channels,
            Variant::ImageNet => 7 * 7 * 3 * plan.stem_channels + bn(plan.stem_channels),
        };

        for stage in &plan.stages {
            let mut c = stage.in_channels;
            for _ in 0..stage.num_layers {
                total += if self.bottleneck {
                    let inter = 4 * k;
                    bn(c) + c * inter + bn(inter) + inter * k * 9
                } else {
                    bn(c) + c * k * 9
                };
                c += k;
            }
            if let Some(out) = stage.transition_channels {
                total += bn(c) + c * out;
            }
        }

        total += bn(plan.feature_channels)
            + plan.feature_channels * plan.num_classes
            + plan.num_classes;
        Ok(total as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bc_100_12_layout() {
        let config = DenseNetConfig::default();
        assert_eq!(config.layers_per_block().unwrap(), 16);

        let plan = config.plan().unwrap();
        assert_eq!(plan.stem_channels, 24);
        assert_eq!(plan.stages.len(), 3);
        assert_eq!(plan.stages[0].block_channels, 24 + 16 * 12);
        assert_eq!(plan.stages[0].transition_channels, Some(108));
        assert_eq!(plan.stages[2].transition_channels, None);
        assert_eq!(plan.feature_channels, 342);
    }

    #[test]
    fn test_bc_100_12_parameter_count() {
        assert_eq!(DenseNetConfig::default().parameter_count().unwrap(), 769_162);
    }

    #[test]
    fn test_basic_40_12_parameter_count() {
        let config = DenseNetConfig {
            depth: 40,
            bottleneck: false,
            reduction: 1.0,
            ..Default::default()
        };
        assert_eq!(config.layers_per_block().unwrap(), 12);
        assert_eq!(config.parameter_count().unwrap(), 1_059_298);
    }

    #[test]
    fn test_imagenet_layout() {
        let config = DenseNetConfig {
            num_classes: 1000,
            variant: Variant::ImageNet,
            ..Default::default()
        };
        assert_eq!(config.layers_per_block().unwrap(), 12);
        let plan = config.plan().unwrap();
        assert_eq!(plan.stages.len(), 4);
        assert!(plan.stages[..3].iter().all(|s| s.transition_channels.is_some()));
    }

    #[test]
    fn test_rejects_uneven_depth() {
        let config = DenseNetConfig {
            depth: 98,
            ..Default::default()
        };
        assert!(config.layers_per_block().is_err());

        // 31 splits into three basic blocks but not three bottleneck blocks
        let config = DenseNetConfig {
            depth: 31,
            ..Default::default()
        };
        assert!(config.layers_per_block().is_err());
        let config = DenseNetConfig {
            bottleneck: false,
            ..config
        };
        assert_eq!(config.layers_per_block().unwrap(), 9);
    }

    #[test]
    fn test_rejects_bad_rates() {
        let config = DenseNetConfig {
            reduction: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DenseNetConfig {
            drop_rate: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
