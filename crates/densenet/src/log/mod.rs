//! Scalar metric logging for training runs.
//!
//! Provides:
//! - `MetricLogger` trait for composable backends
//! - `ConsoleLogger` for debug-level tracing events
//! - `TensorBoardLogger` for event files in `runs/<name>` (`tensorboard` feature)
//! - `CompositeLogger` fanning out to several backends

mod console;
mod logger;
#[cfg(feature = "tensorboard")]
mod tensorboard;

pub use console::ConsoleLogger;
pub use logger::{CompositeLogger, MetricLogger, NoOpLogger};
#[cfg(feature = "tensorboard")]
pub use tensorboard::TensorBoardLogger;
