//! Epoch-level DenseNet trainer.

use super::optimizer::build_optimizer;
use crate::checkpoint::{CheckpointManager, CheckpointState, Checkpointable};
use crate::config::TrainConfig;
use crate::data::{DataLoader, DataSplits};
use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger};
use crate::metrics::{accuracy, AverageMeter, EpochSummary};
use crate::model::{num_parameters, DenseNet};
use crate::schedule::LrSchedule;
use crate::utils::format_duration;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tch::nn::{self, ModuleT};
use tch::Device;

/// Trains one DenseNet and keeps the run's checkpoints.
pub struct Trainer {
    config: TrainConfig,
    device: Device,
    vs: nn::VarStore,
    model: DenseNet,
    optimizer: nn::Optimizer,
    schedule: LrSchedule,
    logger: CompositeLogger,
    checkpoints: CheckpointManager,
    start_epoch: u64,
    best_prec1: f64,
}

impl Trainer {
    /// Build the model, optimizer, loggers and checkpoint manager for `config`.
    pub fn new(config: TrainConfig, device: Device) -> Result<Self> {
        let vs = nn::VarStore::new(device);
        let model = DenseNet::new(&vs.root(), &config.model_config())?;
        tracing::info!("Number of model parameters: {}", num_parameters(&vs));

        if device.is_cuda() {
            tch::Cuda::cudnn_set_benchmark(true);
        }

        let optimizer = build_optimizer(&vs, &config)?;
        let run_dir = config.run_dir();

        let mut logger = CompositeLogger::default();
        logger.add(Box::new(ConsoleLogger::new(config.name.clone())));
        if config.tensorboard {
            #[cfg(feature = "tensorboard")]
            logger.add(Box::new(crate::log::TensorBoardLogger::new(&run_dir)?));
            #[cfg(not(feature = "tensorboard"))]
            tracing::warn!("TensorBoard logging requires the 'tensorboard' feature; ignoring");
        }

        Ok(Self {
            schedule: config.lr_schedule(),
            start_epoch: config.start_epoch,
            checkpoints: CheckpointManager::new(run_dir),
            best_prec1: 0.0,
            config,
            device,
            vs,
            model,
            optimizer,
            logger,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn model(&self) -> &DenseNet {
        &self.model
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn start_epoch(&self) -> u64 {
        self.start_epoch
    }

    pub fn best_prec1(&self) -> f64 {
        self.best_prec1
    }

    /// Resume from the checkpoint at `path`, if there is one.
    ///
    /// Returns whether a checkpoint was loaded.
    pub fn resume(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        match self.checkpoints.load(path)? {
            Some(state) => {
                tracing::info!("=> loading checkpoint '{}'", path.display());
                self.restore(&state)?;
                self.start_epoch = state.epoch;
                self.best_prec1 = state.best_prec1;
                tracing::info!(
                    "=> loaded checkpoint '{}' (epoch {})",
                    path.display(),
                    state.epoch
                );
                Ok(true)
            }
            None => {
                tracing::warn!("=> no checkpoint found at '{}'", path.display());
                Ok(false)
            }
        }
    }

    /// Load the weights of `state` into the model.
    pub fn restore(&mut self, state: &CheckpointState) -> Result<()> {
        state.ensure_compatible(self.model.config())?;
        self.vs.load_state(&state.state_dict)
    }

    /// Snapshot of the current weights for epoch `epoch`.
    pub fn snapshot(&self, epoch: u64) -> Result<CheckpointState> {
        Ok(CheckpointState::new(
            epoch,
            self.best_prec1,
            self.vs.save_state()?,
            self.model.config().clone(),
        ))
    }

    /// Track the best precision and checkpoint finished epoch `epoch`.
    ///
    /// Returns whether `prec1` is a new best.
    pub fn record_epoch(&mut self, epoch: u64, prec1: f64) -> Result<bool> {
        let is_best = prec1 > self.best_prec1;
        self.best_prec1 = self.best_prec1.max(prec1);
        self.checkpoints.save(&self.snapshot(epoch + 1)?, is_best)?;
        Ok(is_best)
    }

    /// One pass over the training split.
    pub fn train_epoch(&mut self, loader: &mut DataLoader, epoch: u64) -> Result<EpochSummary> {
        let mut batch_time = AverageMeter::new();
        let mut losses = AverageMeter::new();
        let mut top1 = AverageMeter::new();
        let num_batches = loader.num_batches();

        loader.reset();
        let mut end = Instant::now();
        let mut i = 0;
        while let Some((images, labels)) = loader.next_batch()? {
            let images = images.to_device(self.device);
            let labels = labels.to_device(self.device);
            let n = labels.size()[0] as u64;

            let logits = self.model.forward_t(&images, true);
            let loss = logits.cross_entropy_for_logits(&labels);
            self.optimizer.backward_step(&loss);

            losses.update(loss.double_value(&[]), n);
            top1.update(accuracy(&logits, &labels), n);
            batch_time.update(end.elapsed().as_secs_f64(), 1);
            end = Instant::now();

            if i % self.config.print_freq == 0 {
                tracing::info!(
                    "Epoch: [{}][{}/{}]\tTime {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPrec@1 {:.3} ({:.3})",
                    epoch,
                    i,
                    num_batches,
                    batch_time.val,
                    batch_time.avg,
                    losses.val,
                    losses.avg,
                    top1.val,
                    top1.avg
                );
            }
            i += 1;
        }

        let summary = EpochSummary {
            loss: losses.avg,
            prec1: top1.avg,
        };
        self.logger.log_metrics(
            &HashMap::from([
                ("train_loss".to_string(), summary.loss),
                ("train_acc".to_string(), summary.prec1),
            ]),
            epoch,
        );
        Ok(summary)
    }

    /// Evaluate on the validation split and return the average top-1 precision.
    pub fn validate(&mut self, loader: &mut DataLoader, epoch: u64) -> Result<f64> {
        let summary = self.evaluate(loader)?;
        tracing::info!(" * Prec@1 {:.3}", summary.prec1);

        self.logger.log_metrics(
            &HashMap::from([
                ("val_loss".to_string(), summary.loss),
                ("val_acc".to_string(), summary.prec1),
            ]),
            epoch,
        );
        Ok(summary.prec1)
    }

    /// Evaluate on the held-out test split.
    pub fn test(&mut self, loader: &mut DataLoader) -> Result<EpochSummary> {
        let summary = self.evaluate(loader)?;
        tracing::info!("Test accuracy: {:.3}", summary.prec1);
        Ok(summary)
    }

    fn evaluate(&self, loader: &mut DataLoader) -> Result<EpochSummary> {
        let mut batch_time = AverageMeter::new();
        let mut losses = AverageMeter::new();
        let mut top1 = AverageMeter::new();
        let num_batches = loader.num_batches();

        loader.reset();
        let mut end = Instant::now();
        let mut i = 0;
        while let Some((images, labels)) = loader.next_batch()? {
            let images = images.to_device(self.device);
            let labels = labels.to_device(self.device);
            let n = labels.size()[0] as u64;

            let (loss, prec1) = tch::no_grad(|| {
                let logits = self.model.forward_t(&images, false);
                let loss = logits.cross_entropy_for_logits(&labels).double_value(&[]);
                (loss, accuracy(&logits, &labels))
            });

            losses.update(loss, n);
            top1.update(prec1, n);
            batch_time.update(end.elapsed().as_secs_f64(), 1);
            end = Instant::now();

            if i % self.config.print_freq == 0 {
                tracing::info!(
                    "Test: [{}/{}]\tTime {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPrec@1 {:.3} ({:.3})",
                    i,
                    num_batches,
                    batch_time.val,
                    batch_time.avg,
                    losses.val,
                    losses.avg,
                    top1.val,
                    top1.avg
                );
            }
            i += 1;
        }

        Ok(EpochSummary {
            loss: losses.avg,
            prec1: top1.avg,
        })
    }

    /// Train from the start epoch to the configured last epoch.
    ///
    /// Returns the best validation precision.
    pub fn fit(&mut self, splits: &mut DataSplits) -> Result<f64> {
        let run_dir = self.checkpoints.run_dir().to_path_buf();
        self.config.save_json(run_dir.join("config.json"))?;

        let epochs = self.config.epochs;
        let pb = ProgressBar::new(epochs);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} epochs ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_position(self.start_epoch);

        let started = Instant::now();
        for epoch in self.start_epoch..epochs {
            let lr = self.schedule.lr_at(epoch);
            self.optimizer.set_lr(lr);
            self.logger.log_scalar("learning_rate", lr, epoch);

            let epoch_start = Instant::now();
            self.train_epoch(&mut splits.train, epoch)?;
            let prec1 = self.validate(&mut splits.val, epoch)?;

            self.record_epoch(epoch, prec1)?;

            tracing::debug!(
                epoch,
                lr,
                elapsed = %format_duration(epoch_start.elapsed()),
                "Finished epoch"
            );
            pb.inc(1);
            pb.set_message(format!("prec@1 {:.2} (best {:.2})", prec1, self.best_prec1));
        }
        pb.finish_and_clear();

        tracing::info!(
            "Best accuracy: {} ({})",
            self.best_prec1,
            format_duration(started.elapsed())
        );

        if let Some(test) = splits.test.as_mut() {
            self.test(test)?;
        }
        self.logger.close();

        Ok(self.best_prec1)
    }
}
