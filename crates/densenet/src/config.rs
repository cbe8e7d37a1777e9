//! Training run configuration.

use crate::model::{DenseNetConfig, Variant};
use crate::schedule::LrSchedule;
use crate::{DenseNetError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Dataset a run trains on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Cifar10,
    ImageNet,
}

impl DatasetKind {
    pub fn num_classes(self) -> i64 {
        match self {
            DatasetKind::Cifar10 => 10,
            DatasetKind::ImageNet => 1000,
        }
    }
}

/// Configuration for a DenseNet training run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    // Schedule
    /// Total number of epochs to run
    pub epochs: u64,
    /// Epoch to start from (overwritten when resuming)
    pub start_epoch: u64,
    /// Mini-batch size
    pub batch_size: usize,
    /// Initial learning rate
    pub lr: f64,
    /// SGD momentum
    pub momentum: f64,
    /// L2 weight decay
    pub weight_decay: f64,
    /// Log every N batches
    pub print_freq: usize,

    // Architecture
    /// Total number of layers
    pub layers: i64,
    /// New channels per dense layer
    pub growth: i64,
    /// Dropout probability
    pub droprate: f64,
    /// Compression rate in transition stages
    pub reduce: f64,
    /// Use bottleneck (1x1) layers
    pub bottleneck: bool,

    // Data
    /// Standard augmentation on the training set
    pub augment: bool,
    /// Which dataset to train on
    pub dataset: DatasetKind,
    /// Root directory containing `cifar-10-batches-bin`
    pub data_dir: PathBuf,
    /// Root directory containing ImageNet `train/` and `val/`
    pub imagenet_dir: PathBuf,
    /// Fraction of the CIFAR train set held out for validation
    pub val_fraction: f64,
    /// Image decoding threads
    pub workers: usize,

    // Run
    /// Checkpoint to resume from
    pub resume: Option<PathBuf>,
    /// Experiment name whose checkpoint should be tested
    pub test: Option<String>,
    /// Experiment name
    pub name: String,
    /// Directory holding one sub-directory per experiment
    pub runs_dir: PathBuf,
    /// Log scalars to TensorBoard
    pub tensorboard: bool,
    /// Random seed
    pub seed: u64,
    /// Force CPU even when CUDA is available
    pub cpu: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 300,
            start_epoch: 0,
            batch_size: 64,
            lr: 0.1,
            momentum: 0.9,
            weight_decay: 1e-4,
            print_freq: 10,

            layers: 100,
            growth: 12,
            droprate: 0.0,
            reduce: 0.5,
            bottleneck: true,

            augment: true,
            dataset: DatasetKind::Cifar10,
            data_dir: PathBuf::from("../data"),
            imagenet_dir: PathBuf::from("../data/ILSVRC/Data/CLS-LOC"),
            val_fraction: 0.1,
            workers: 4,

            resume: None,
            test: None,
            name: "DenseNet_BC_100_12".to_string(),
            runs_dir: PathBuf::from("runs"),
            tensorboard: false,
            seed: 42,
            cpu: false,
        }
    }
}

impl TrainConfig {
    /// Switch to ImageNet
    pub fn imagenet(mut self) -> Self {
        self.dataset = DatasetKind::ImageNet;
        self
    }

    /// Set experiment name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set number of epochs
    pub fn with_epochs(mut self, epochs: u64) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set runs directory
    pub fn with_runs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runs_dir = dir.into();
        self
    }

    pub fn num_classes(&self) -> i64 {
        self.dataset.num_classes()
    }

    /// Directory for this experiment's checkpoints and event files.
    pub fn run_dir(&self) -> PathBuf {
        self.runs_dir.join(&self.name)
    }

    pub fn model_config(&self) -> DenseNetConfig {
        let variant = match self.dataset {
            DatasetKind::Cifar10 => Variant::Cifar,
            DatasetKind::ImageNet => Variant::ImageNet,
        };
        DenseNetConfig {
            depth: self.layers,
            num_classes: self.num_classes(),
            growth_rate: self.growth,
            reduction: self.reduce,
            bottleneck: self.bottleneck,
            drop_rate: self.droprate,
            variant,
        }
    }

    pub fn lr_schedule(&self) -> LrSchedule {
        LrSchedule::for_dataset(self.dataset, self.lr)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(DenseNetError::Config(msg));

        if self.batch_size == 0 {
            return fail("batch size must be positive".into());
        }
        if self.print_freq == 0 {
            return fail("print frequency must be positive".into());
        }
        if self.start_epoch > self.epochs {
            return fail(format!(
                "start epoch {} is past the last epoch {}",
                self.start_epoch, self.epochs
            ));
        }
        for (name, value) in [
            ("learning rate", self.lr),
            ("momentum", self.momentum),
            ("weight decay", self.weight_decay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return fail(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            return fail(format!(
                "validation fraction must be in [0, 1), got {}",
                self.val_fraction
            ));
        }
        if self.name.is_empty() {
            return fail("experiment name must not be empty".into());
        }

        self.model_config().validate()
    }

    /// Write the resolved configuration as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.epochs, 300);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.layers, 100);
        assert_eq!(config.growth, 12);
        assert!(config.augment);
        assert!(config.bottleneck);
        assert_eq!(config.num_classes(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_dir() {
        let config = TrainConfig::default()
            .with_runs_dir("/tmp/runs")
            .with_name("exp1");
        assert_eq!(config.run_dir(), PathBuf::from("/tmp/runs/exp1"));
    }

    #[test]
    fn test_imagenet_model_config() {
        let config = TrainConfig::default().imagenet();
        let model = config.model_config();
        assert_eq!(model.num_classes, 1000);
        assert_eq!(model.variant, Variant::ImageNet);
        assert_eq!(config.lr_schedule().first, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrainConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.start_epoch = 301;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.lr = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.droprate = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.layers = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = TrainConfig::default().imagenet().with_epochs(90);

        config.save_json(&path).unwrap();
        let restored = TrainConfig::load_json(&path).unwrap();

        assert_eq!(config, restored);
    }
}
