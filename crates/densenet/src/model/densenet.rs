//! DenseNet-BC network built on `tch::nn`.

use super::config::{DenseNetConfig, Variant};
use crate::Result;
use tch::nn::{self, ModuleT};
use tch::Tensor;

/// 3x3/1x1/7x7 convolution without bias, He-initialised over fan-out.
fn conv(p: nn::Path, c_in: i64, c_out: i64, ksize: i64, stride: i64, padding: i64) -> nn::Conv2D {
    let fan_out = (ksize * ksize * c_out) as f64;
    let config = nn::ConvConfig {
        stride,
        padding,
        bias: false,
        ws_init: nn::Init::Randn {
            mean: 0.0,
            stdev: (2.0 / fan_out).sqrt(),
        },
        ..Default::default()
    };
    nn::conv2d(p, c_in, c_out, ksize, config)
}

fn batch_norm(p: nn::Path, channels: i64) -> nn::BatchNorm {
    let config = nn::BatchNormConfig {
        ws_init: nn::Init::Const(1.0),
        bs_init: nn::Init::Const(0.0),
        ..Default::default()
    };
    nn::batch_norm2d(p, channels, config)
}

fn dropout(xs: Tensor, p: f64, train: bool) -> Tensor {
    if p > 0.0 {
        xs.dropout(p, train)
    } else {
        xs
    }
}

/// BN-ReLU-Conv(3x3), optionally preceded by a BN-ReLU-Conv(1x1) bottleneck.
/// The output is concatenated onto the input along channels.
#[derive(Debug)]
struct DenseLayer {
    bottleneck: Option<(nn::BatchNorm, nn::Conv2D)>,
    bn: nn::BatchNorm,
    conv: nn::Conv2D,
    drop_rate: f64,
}

impl DenseLayer {
    fn new(p: nn::Path, c_in: i64, growth: i64, bottleneck: bool, drop_rate: f64) -> Self {
        let (bottleneck, c_mid) = if bottleneck {
            let inter = 4 * growth;
            let layers = (
                batch_norm(&p / "bn1", c_in),
                conv(&p / "conv1", c_in, inter, 1, 1, 0),
            );
            (Some(layers), inter)
        } else {
            (None, c_in)
        };
        Self {
            bottleneck,
            bn: batch_norm(&p / "bn2", c_mid),
            conv: conv(&p / "conv2", c_mid, growth, 3, 1, 1),
            drop_rate,
        }
    }
}

impl ModuleT for DenseLayer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let squeezed = self.bottleneck.as_ref().map(|(bn, conv)| {
            dropout(
                xs.apply_t(bn, train).relu().apply(conv),
                self.drop_rate,
                train,
            )
        });
        let input = squeezed.as_ref().unwrap_or(xs);
        let ys = dropout(
            input.apply_t(&self.bn, train).relu().apply(&self.conv),
            self.drop_rate,
            train,
        );
        Tensor::cat(&[xs, &ys], 1)
    }
}

#[derive(Debug)]
struct DenseBlock {
    layers: Vec<DenseLayer>,
}

impl DenseBlock {
    fn new(p: nn::Path, num_layers: i64, c_in: i64, config: &DenseNetConfig) -> Self {
        let layers = (0..num_layers)
            .map(|i| {
                DenseLayer::new(
                    &p / format!("layer{}", i),
                    c_in + i * config.growth_rate,
                    config.growth_rate,
                    config.bottleneck,
                    config.drop_rate,
                )
            })
            .collect();
        Self { layers }
    }
}

impl ModuleT for DenseBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.layers
            .iter()
            .fold(xs.shallow_clone(), |acc, layer| acc.apply_t(layer, train))
    }
}

/// BN-ReLU-Conv(1x1) compression followed by 2x2 average pooling.
#[derive(Debug)]
struct Transition {
    bn: nn::BatchNorm,
    conv: nn::Conv2D,
    drop_rate: f64,
}

impl Transition {
    fn new(p: nn::Path, c_in: i64, c_out: i64, drop_rate: f64) -> Self {
        Self {
            bn: batch_norm(&p / "bn", c_in),
            conv: conv(&p / "conv", c_in, c_out, 1, 1, 0),
            drop_rate,
        }
    }
}

impl ModuleT for Transition {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = xs.apply_t(&self.bn, train).relu().apply(&self.conv);
        dropout(ys, self.drop_rate, train).avg_pool2d_default(2)
    }
}

#[derive(Debug)]
enum Stem {
    /// 3x3 conv, stride 1
    Cifar(nn::Conv2D),
    /// 7x7 conv stride 2, BN-ReLU, 3x3 max pool stride 2
    ImageNet(nn::Conv2D, nn::BatchNorm),
}

impl ModuleT for Stem {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        match self {
            Stem::Cifar(conv) => xs.apply(conv),
            Stem::ImageNet(conv, bn) => xs
                .apply(conv)
                .apply_t(bn, train)
                .relu()
                .max_pool2d([3, 3], [2, 2], [1, 1], [1, 1], false),
        }
    }
}

/// DenseNet-BC classifier.
///
/// Three dense blocks on the CIFAR layout, four on the ImageNet layout,
/// followed by BN-ReLU, global average pooling and a linear classifier.
#[derive(Debug)]
pub struct DenseNet {
    stem: Stem,
    blocks: Vec<DenseBlock>,
    transitions: Vec<Transition>,
    bn: nn::BatchNorm,
    fc: nn::Linear,
    config: DenseNetConfig,
}

impl DenseNet {
    /// Create a new DenseNet under `p`.
    pub fn new(p: &nn::Path, config: &DenseNetConfig) -> Result<Self> {
        let plan = config.plan()?;

        let stem = match config.variant {
            Variant::Cifar => Stem::Cifar(conv(p / "conv1", 3, plan.stem_channels, 3, 1, 1)),
            Variant::ImageNet => Stem::ImageNet(
                conv(p / "conv1", 3, plan.stem_channels, 7, 2, 3),
                batch_norm(p / "bn0", plan.stem_channels),
            ),
        };

        let mut blocks = Vec::with_capacity(plan.stages.len());
        let mut transitions = Vec::with_capacity(plan.stages.len());
        for (i, stage) in plan.stages.iter().enumerate() {
            blocks.push(DenseBlock::new(
                p / format!("block{}", i + 1),
                stage.num_layers,
                stage.in_channels,
                config,
            ));
            if let Some(out) = stage.transition_channels {
                transitions.push(Transition::new(
                    p / format!("trans{}", i + 1),
                    stage.block_channels,
                    out,
                    config.drop_rate,
                ));
            }
        }

        let bn = batch_norm(p / "bn1", plan.feature_channels);
        let fc = nn::linear(
            p / "fc",
            plan.feature_channels,
            config.num_classes,
            nn::LinearConfig {
                bs_init: Some(nn::Init::Const(0.0)),
                ..Default::default()
            },
        );

        Ok(Self {
            stem,
            blocks,
            transitions,
            bn,
            fc,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &DenseNetConfig {
        &self.config
    }
}

impl ModuleT for DenseNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut out = xs.apply_t(&self.stem, train);
        for (i, block) in self.blocks.iter().enumerate() {
            out = out.apply_t(block, train);
            if let Some(transition) = self.transitions.get(i) {
                out = out.apply_t(transition, train);
            }
        }
        out.apply_t(&self.bn, train)
            .relu()
            .adaptive_avg_pool2d([1, 1])
            .flatten(1, -1)
            .apply(&self.fc)
    }
}

/// Number of trainable parameters held by a var store.
pub fn num_parameters(vs: &nn::VarStore) -> u64 {
    vs.trainable_variables()
        .iter()
        .map(|t| t.numel() as u64)
        .sum()
}
