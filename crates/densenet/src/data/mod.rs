//! Data pipeline.
//!
//! Provides:
//! - `random_split` - seeded train/validation index split
//! - `BatchSampler` - shuffled mini-batch indices
//! - `ClassFolder`, `load_rgb` - `root/<class>/<image>` indexing and decoding
//! - `Pipeline` - standard CIFAR/ImageNet augmentation
//! - `Cifar10`, `ImageFolder`, `DataLoader`, `DataSplits` - tensor datasets (requires `torch`)

#[cfg(feature = "torch")]
mod dataset;
mod folder;
mod sampler;
mod split;
pub mod transforms;

#[cfg(feature = "torch")]
pub use dataset::{Cifar10, DataLoader, DataSplits, Dataset, ImageFolder};
pub use folder::{load_rgb, ClassFolder, IMAGE_EXTENSIONS};
pub use sampler::BatchSampler;
pub use split::random_split;
pub use transforms::{Pipeline, Transform};
