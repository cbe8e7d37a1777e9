//! Checkpoint manager for latest/best persistence of a run.

use super::state::CheckpointState;
use crate::{DenseNetError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File holding the most recent epoch.
pub const CHECKPOINT_FILE: &str = "checkpoint.pth.tar";
/// Copy of the checkpoint with the best validation precision.
pub const BEST_FILE: &str = "model_best.pth.tar";

/// Path of the latest checkpoint for experiment `name`.
pub fn test_checkpoint_path(runs_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    runs_dir.as_ref().join(name).join(CHECKPOINT_FILE)
}

/// Manages the checkpoint files of one run directory.
///
/// # Example
///
/// ```ignore
/// let manager = CheckpointManager::new("runs/DenseNet_BC_100_12");
///
/// // In training loop:
/// let state = CheckpointState::new(epoch + 1, best_prec1, weights, model_config);
/// manager.save(&state, is_best)?;
///
/// // To resume:
/// if let Some(state) = manager.load(manager.latest_path())? {
///     println!("Resuming at epoch {}", state.epoch);
/// }
/// ```
pub struct CheckpointManager {
    run_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.run_dir.join(CHECKPOINT_FILE)
    }

    pub fn best_path(&self) -> PathBuf {
        self.run_dir.join(BEST_FILE)
    }

    /// Write the latest checkpoint, and copy it to the best slot if `is_best`.
    pub fn save(&self, state: &CheckpointState, is_best: bool) -> Result<PathBuf> {
        fs::create_dir_all(&self.run_dir)?;

        let path = self.latest_path();
        fs::write(&path, state.to_bytes()?)?;
        tracing::debug!(path = %path.display(), epoch = state.epoch, "Saved checkpoint");

        if is_best {
            fs::copy(&path, self.best_path())?;
            tracing::info!(prec1 = state.best_prec1, "New best checkpoint!");
        }

        Ok(path)
    }

    /// Load a checkpoint file.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Option<CheckpointState>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let state = CheckpointState::from_bytes(&data).map_err(|e| {
            DenseNetError::Checkpoint(format!("cannot decode {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), epoch = state.epoch, "Loaded checkpoint");
        Ok(Some(state))
    }

    pub fn load_best(&self) -> Result<Option<CheckpointState>> {
        self.load(self.best_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DenseNetConfig;
    use tempfile::tempdir;

    fn state(epoch: u64, best: f64, data: Vec<u8>) -> CheckpointState {
        CheckpointState::new(epoch, best, data, DenseNetConfig::default())
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("exp"));

        let path = manager.save(&state(10, 50.0, vec![1, 2, 3, 4, 5]), false).unwrap();
        assert_eq!(path, dir.path().join("exp").join(CHECKPOINT_FILE));

        let loaded = manager.load(&path).unwrap().unwrap();
        assert_eq!(loaded.epoch, 10);
        assert_eq!(loaded.state_dict, vec![1, 2, 3, 4, 5]);
        assert!(!manager.best_path().exists());
    }

    #[test]
    fn test_best_checkpoint_tracking() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());

        manager.save(&state(1, 50.0, vec![1]), true).unwrap();
        manager.save(&state(2, 75.0, vec![2]), true).unwrap();
        // Not a new best
        manager.save(&state(3, 75.0, vec![3]), false).unwrap();

        let best = manager.load_best().unwrap().unwrap();
        assert_eq!(best.epoch, 2);
        assert_eq!(best.state_dict, vec![2]);

        let latest = manager.load(manager.latest_path()).unwrap().unwrap();
        assert_eq!(latest.epoch, 3);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        assert!(manager.load(dir.path().join("nope.pth.tar")).unwrap().is_none());
        assert!(manager.load_best().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        fs::write(manager.latest_path(), [9, 8, 7]).unwrap();
        assert!(manager.load(manager.latest_path()).is_err());
    }

    #[test]
    fn test_test_checkpoint_path() {
        assert_eq!(
            test_checkpoint_path("runs", "DenseNet_BC_100_12"),
            PathBuf::from("runs/DenseNet_BC_100_12/checkpoint.pth.tar")
        );
    }
}
