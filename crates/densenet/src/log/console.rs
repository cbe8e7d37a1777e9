//! Console logging backend.

use super::MetricLogger;
use std::collections::HashMap;

/// Emits epoch scalars as debug-level tracing events tagged with the experiment.
///
/// Enable with `RUST_LOG=densenet=debug`.
#[derive(Default)]
pub struct ConsoleLogger {
    run: String,
}

impl ConsoleLogger {
    pub fn new(run: impl Into<String>) -> Self {
        Self { run: run.into() }
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::debug!(run = %self.run, epoch = step, "{} = {:.4}", name, value);
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        let mut pairs: Vec<_> = metrics.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let line = pairs
            .iter()
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(run = %self.run, epoch = step, "{}", line);
    }
}
