//! Checkpoint state and trait definitions.

use crate::model::DenseNetConfig;
use crate::{DenseNetError, Result};
use serde::{Deserialize, Serialize};

/// Trait for components whose state can be checkpointed.
///
/// # Example
///
/// ```ignore
/// impl Checkpointable for MyModel {
///     fn save_state(&self) -> Result<Vec<u8>> {
///         Ok(bincode::serialize(&self.weights)?)
///     }
///
///     fn load_state(&mut self, data: &[u8]) -> Result<()> {
///         self.weights = bincode::deserialize(data)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Checkpointable {
    /// Serialize the component's state to bytes.
    fn save_state(&self) -> Result<Vec<u8>>;

    /// Restore the component's state from bytes.
    fn load_state(&mut self, data: &[u8]) -> Result<()>;
}

#[cfg(feature = "torch")]
impl Checkpointable for tch::nn::VarStore {
    fn save_state(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.save_to_stream(&mut buf)?;
        Ok(buf)
    }

    fn load_state(&mut self, data: &[u8]) -> Result<()> {
        self.load_from_stream(std::io::Cursor::new(data))?;
        Ok(())
    }
}

/// Everything needed to resume or evaluate a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckpointState {
    /// Next epoch to run (finished epochs)
    pub epoch: u64,
    /// Best validation top-1 precision so far, in percent
    pub best_prec1: f64,
    /// Serialized model weights
    pub state_dict: Vec<u8>,
    /// Architecture the weights belong to
    pub model: DenseNetConfig,
    /// Seconds since the Unix epoch at save time
    pub timestamp: u64,
    /// Crate version that wrote the checkpoint
    pub version: String,
}

impl CheckpointState {
    pub fn new(epoch: u64, best_prec1: f64, state_dict: Vec<u8>, model: DenseNetConfig) -> Self {
        Self {
            epoch,
            best_prec1,
            state_dict,
            model,
            timestamp: unix_timestamp(),
            version: crate::VERSION.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    /// Fail unless the stored weights fit a network built from `expected`.
    pub fn ensure_compatible(&self, expected: &DenseNetConfig) -> Result<()> {
        if !self.model.same_weights_as(expected) {
            return Err(DenseNetError::Checkpoint(format!(
                "checkpoint architecture {:?} does not match configured {:?}",
                self.model, expected
            )));
        }
        Ok(())
    }
}

fn unix_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variant;

    #[test]
    fn test_checkpoint_state_creation() {
        let state = CheckpointState::new(10, 93.5, vec![1, 2, 3], DenseNetConfig::default());

        assert_eq!(state.epoch, 10);
        assert_eq!(state.best_prec1, 93.5);
        assert_eq!(state.state_dict, vec![1, 2, 3]);
        assert_eq!(state.version, crate::VERSION);
        assert!(state.timestamp > 0);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let state = CheckpointState::new(5, 12.25, vec![9; 64], DenseNetConfig::default());
        let restored = CheckpointState::from_bytes(&state.to_bytes().unwrap()).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        assert!(CheckpointState::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_compatibility_check() {
        let state = CheckpointState::new(1, 0.0, vec![], DenseNetConfig::default());
        assert!(state.ensure_compatible(&DenseNetConfig::default()).is_ok());

        let imagenet = DenseNetConfig {
            num_classes: 1000,
            variant: Variant::ImageNet,
            ..Default::default()
        };
        assert!(state.ensure_compatible(&imagenet).is_err());
    }

    #[test]
    fn test_drop_rate_does_not_affect_compatibility() {
        let dropout = DenseNetConfig {
            drop_rate: 0.2,
            ..Default::default()
        };
        let state = CheckpointState::new(300, 95.0, vec![], dropout);
        assert!(state.ensure_compatible(&DenseNetConfig::default()).is_ok());

        let basic = DenseNetConfig {
            bottleneck: false,
            ..Default::default()
        };
        assert!(state.ensure_compatible(&basic).is_err());
    }
}
