//! Optimizer construction.

use crate::config::TrainConfig;
use crate::Result;
use tch::nn::{self, OptimizerConfig};

/// SGD with Nesterov momentum and L2 weight decay over every trainable variable.
///
/// Nesterov needs a positive momentum, so a zero momentum falls back to plain SGD.
pub fn build_optimizer(vs: &nn::VarStore, config: &TrainConfig) -> Result<nn::Optimizer> {
    let sgd = nn::Sgd {
        momentum: config.momentum,
        dampening: 0.0,
        wd: config.weight_decay,
        nesterov: config.momentum > 0.0,
    };
    Ok(sgd.build(vs, config.lr)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::Module;
    use tch::{Device, Kind, Tensor};

    #[test]
    fn test_step_moves_weights() {
        let vs = nn::VarStore::new(Device::Cpu);
        let linear = nn::linear(vs.root() / "fc", 4, 2, Default::default());
        let mut opt = build_optimizer(&vs, &TrainConfig::default()).unwrap();

        let before = linear.ws.detach().copy();
        let xs = Tensor::ones([8, 4], (Kind::Float, Device::Cpu));
        let targets = Tensor::zeros([8], (Kind::Int64, Device::Cpu));
        let loss = linear.forward(&xs).cross_entropy_for_logits(&targets);
        opt.backward_step(&loss);

        let delta = (&linear.ws - before).abs().sum(Kind::Float).double_value(&[]);
        assert!(delta > 0.0);
    }

    #[test]
    fn test_zero_momentum_builds() {
        let vs = nn::VarStore::new(Device::Cpu);
        let _ = nn::linear(vs.root() / "fc", 4, 2, Default::default());
        let config = TrainConfig {
            momentum: 0.0,
            ..Default::default()
        };
        let mut opt = build_optimizer(&vs, &config).unwrap();
        opt.set_lr(0.01);
    }
}
