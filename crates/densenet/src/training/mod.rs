//! Supervised training of DenseNet classifiers.
//!
//! Provides:
//! - `build_optimizer` - Nesterov SGD with weight decay
//! - `Trainer` - epoch loops, validation, checkpointing
//! - `run` / `run_with_splits` - end-to-end entry points used by the CLI

mod optimizer;
mod trainer;

pub use optimizer::build_optimizer;
pub use trainer::Trainer;

use crate::checkpoint::test_checkpoint_path;
use crate::config::{DatasetKind, TrainConfig};
use crate::data::DataSplits;
use crate::metrics::EpochSummary;
use crate::Result;
use tch::Device;

/// Device a run executes on.
pub fn select_device(config: &TrainConfig) -> Device {
    if config.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunOutcome {
    /// Trained to the last epoch
    Trained { best_prec1: f64 },
    /// Evaluated a stored checkpoint on the test split, if there is one
    Tested(Option<EpochSummary>),
    /// `--test` named an experiment without a checkpoint
    NoModel,
}

/// Train (or test) a model as described by `config`.
pub fn run(config: TrainConfig) -> Result<RunOutcome> {
    config.validate()?;
    crate::utils::set_seed(config.seed);

    let device = select_device(&config);
    tracing::info!(?device, "Using device");

    let mut splits = DataSplits::build(&config)?;
    run_with_splits(config, device, &mut splits)
}

/// Everything `run` does once the data is loaded.
pub fn run_with_splits(
    config: TrainConfig,
    device: Device,
    splits: &mut DataSplits,
) -> Result<RunOutcome> {
    let mut trainer = Trainer::new(config.clone(), device)?;

    if let Some(path) = &config.resume {
        trainer.resume(path)?;
    }

    match (&config.test, config.dataset) {
        (Some(name), DatasetKind::Cifar10) => {
            let path = test_checkpoint_path(&config.runs_dir, name);
            let Some(state) = trainer.checkpoints().load(&path)? else {
                tracing::warn!(path = %path.display(), "=> no model found");
                return Ok(RunOutcome::NoModel);
            };

            tracing::info!(path = %path.display(), epoch = state.epoch, "Testing checkpoint");
            trainer.restore(&state)?;
            let summary = match splits.test.as_mut() {
                Some(test) => Some(trainer.test(test)?),
                None => None,
            };
            Ok(RunOutcome::Tested(summary))
        }
        (test, _) => {
            if test.is_some() {
                tracing::warn!("--test is only supported for CIFAR-10; training instead");
            }
            let best_prec1 = trainer.fit(splits)?;
            Ok(RunOutcome::Trained { best_prec1 })
        }
    }
}
