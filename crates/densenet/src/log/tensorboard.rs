//! TensorBoard event-file backend.

use super::MetricLogger;
use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Writes epoch scalars into the run directory so `tensorboard --logdir runs`
/// shows one curve per experiment.
pub struct TensorBoardLogger {
    log_dir: PathBuf,
    writer: Mutex<SummaryWriter>,
}

impl TensorBoardLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;
        tracing::info!(dir = %log_dir.display(), "Writing TensorBoard events");

        Ok(Self {
            writer: Mutex::new(SummaryWriter::new(&log_dir)),
            log_dir,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn with_writer(&self, f: impl FnOnce(&mut SummaryWriter)) {
        match self.writer.lock() {
            Ok(mut writer) => {
                f(&mut writer);
                let _ = writer.flush();
            }
            Err(_) => tracing::warn!("TensorBoard writer poisoned; dropping scalars"),
        }
    }
}

impl MetricLogger for TensorBoardLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        self.with_writer(|w| w.add_scalar(name, value as f32, step as usize));
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        let mut sorted: Vec<_> = metrics.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        self.with_writer(|w| {
            for (name, value) in sorted {
                w.add_scalar(name, *value as f32, step as usize);
            }
        });
    }

    fn close(&self) {
        self.with_writer(|_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writes_event_file() {
        let dir = tempdir().unwrap();
        let run_dir = dir.path().join("DenseNet_BC_100_12");
        let logger = TensorBoardLogger::new(&run_dir).unwrap();

        logger.log_scalar("learning_rate", 0.1, 0);
        logger.log_metrics(
            &HashMap::from([("val_acc".to_string(), 42.0), ("val_loss".to_string(), 1.5)]),
            0,
        );
        logger.close();

        assert_eq!(logger.log_dir(), run_dir.as_path());
        assert!(fs::read_dir(&run_dir).unwrap().next().is_some());
    }
}
