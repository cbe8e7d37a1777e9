//! Checkpointing of training runs.
//!
//! Provides:
//! - `Checkpointable` trait for components that can be saved/restored
//! - `CheckpointState` for epoch, best precision and weights
//! - `CheckpointManager` for the latest/best files of a run directory

mod manager;
mod state;

pub use manager::{test_checkpoint_path, CheckpointManager, BEST_FILE, CHECKPOINT_FILE};
pub use state::{CheckpointState, Checkpointable};
