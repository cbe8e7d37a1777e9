//! DenseNet-BC architecture.
//!
//! Provides:
//! - `DenseNetConfig` - depth/growth/compression description with an exact parameter count
//! - `ArchitecturePlan` - per-stage channel bookkeeping
//! - `DenseNet` - the `tch` network (requires `torch` feature)

mod config;
#[cfg(feature = "torch")]
mod densenet;

pub use config::{ArchitecturePlan, DenseNetConfig, StagePlan, Variant};
#[cfg(feature = "torch")]
pub use densenet::{num_parameters, DenseNet};
