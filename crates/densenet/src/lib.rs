//! # DenseNet
//!
//! Supervised training of DenseNet-BC image classifiers on CIFAR-10 or an
//! ImageNet-style class-folder dataset.
//!
//! ## Overview
//!
//! The crate provides:
//! - `TrainConfig` - every hyperparameter of a run, with the usual defaults
//! - `DenseNetConfig` - architecture description and exact parameter count
//! - `LrSchedule` - step decay of the learning rate
//! - `CheckpointManager` - latest/best checkpoint persistence per run
//! - `Trainer` - epoch-level train/validate/test loops - requires `torch` feature
//!
//! ## Features
//!
//! - `default` - Configuration, schedules, checkpoint containers, index sampling
//! - `torch` - Model, transforms, datasets and training (requires libtorch)
//! - `tensorboard` - TensorBoard event-file logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use densenet::prelude::*;
//!
//! let config = TrainConfig::default().with_name("DenseNet_BC_100_12");
//! densenet::training::run(config)?;
//! ```

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod log;
pub mod metrics;
pub mod model;
pub mod schedule;
pub mod utils;

#[cfg(feature = "torch")]
pub mod training;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{CheckpointManager, CheckpointState, Checkpointable};
    pub use crate::config::{DatasetKind, TrainConfig};
    pub use crate::data::{random_split, BatchSampler, ClassFolder, Pipeline};
    pub use crate::metrics::{AverageMeter, EpochSummary};
    pub use crate::model::{ArchitecturePlan, DenseNetConfig, Variant};
    pub use crate::schedule::LrSchedule;

    #[cfg(feature = "tensorboard")]
    pub use crate::log::TensorBoardLogger;
    pub use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger, NoOpLogger};

    #[cfg(feature = "torch")]
    pub use crate::data::{DataLoader, DataSplits, Dataset};
    #[cfg(feature = "torch")]
    pub use crate::model::DenseNet;
    #[cfg(feature = "torch")]
    pub use crate::training::Trainer;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum DenseNetError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Data(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "torch")]
    #[error("Tensor error: {0}")]
    Tensor(#[from] tch::TchError),
}

pub type Result<T> = core::result::Result<T, DenseNetError>;
