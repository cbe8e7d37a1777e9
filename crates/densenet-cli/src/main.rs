//! DenseNet CLI
//!
//! Command-line interface for training DenseNet-BC on CIFAR-10 or ImageNet.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use densenet::config::{DatasetKind, TrainConfig};
use densenet::model::{DenseNetConfig, Variant};
use densenet::utils::abbreviate;

#[derive(Parser)]
#[command(name = "densenet")]
#[command(version, about = "DenseNet-BC training on CIFAR-10 and ImageNet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model (requires --features torch)
    Train(TrainArgs),

    /// Print the architecture plan and parameter count
    Summary {
        #[command(flatten)]
        arch: ArchArgs,
    },
}

/// Architecture flags shared by `train` and `summary`.
#[derive(Args, Clone, Debug)]
struct ArchArgs {
    /// Total number of layers
    #[arg(long, default_value_t = 100)]
    layers: i64,

    /// Number of new channels per layer
    #[arg(long, default_value_t = 12)]
    growth: i64,

    /// Dropout probability
    #[arg(long, default_value_t = 0.0)]
    droprate: f64,

    /// Compression rate in transition stage
    #[arg(long, default_value_t = 0.5)]
    reduce: f64,

    /// Do not use bottleneck blocks
    #[arg(long = "no-bottleneck")]
    no_bottleneck: bool,

    /// Use the ImageNet dataset and four-block network
    #[arg(long)]
    imagenet: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Number of total epochs to run
    #[arg(long, default_value_t = 300)]
    epochs: u64,

    /// Manual epoch number (useful on restarts)
    #[arg(long, default_value_t = 0)]
    start_epoch: u64,

    /// Mini-batch size
    #[arg(short = 'b', long, default_value_t = 64)]
    batch_size: usize,

    /// Initial learning rate
    #[arg(long = "lr", visible_alias = "learning-rate", default_value_t = 0.1)]
    lr: f64,

    /// Momentum
    #[arg(long, default_value_t = 0.9)]
    momentum: f64,

    /// Weight decay
    #[arg(long, visible_alias = "wd", default_value_t = 1e-4)]
    weight_decay: f64,

    /// Print frequency in batches
    #[arg(short = 'p', long, default_value_t = 10)]
    print_freq: usize,

    #[command(flatten)]
    arch: ArchArgs,

    /// Disable standard augmentation
    #[arg(long = "no-augment")]
    no_augment: bool,

    /// Path to latest checkpoint
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Name of the experiment whose checkpoint should be tested
    #[arg(long)]
    test: Option<String>,

    /// Name of experiment
    #[arg(long, default_value = "DenseNet_BC_100_12")]
    name: String,

    /// Log progress to TensorBoard
    #[arg(long)]
    tensorboard: bool,

    /// Directory containing cifar-10-batches-bin
    #[arg(long, default_value = "../data")]
    data_dir: PathBuf,

    /// Directory containing the ImageNet train/ and val/ folders
    #[arg(long, default_value = "../data/ILSVRC/Data/CLS-LOC")]
    imagenet_dir: PathBuf,

    /// Directory holding one sub-directory per experiment
    #[arg(long, default_value = "runs")]
    runs_dir: PathBuf,

    /// Fraction of the CIFAR-10 train set held out for validation
    #[arg(long, default_value_t = 0.1)]
    val_fraction: f64,

    /// Image decoding threads
    #[arg(short = 'j', long, default_value_t = 4)]
    workers: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run on the CPU even when CUDA is available
    #[arg(long)]
    cpu: bool,
}

impl ArchArgs {
    fn dataset(&self) -> DatasetKind {
        if self.imagenet {
            DatasetKind::ImageNet
        } else {
            DatasetKind::Cifar10
        }
    }

    fn model_config(&self) -> DenseNetConfig {
        let dataset = self.dataset();
        DenseNetConfig {
            depth: self.layers,
            num_classes: dataset.num_classes(),
            growth_rate: self.growth,
            reduction: self.reduce,
            bottleneck: !self.no_bottleneck,
            drop_rate: self.droprate,
            variant: match dataset {
                DatasetKind::Cifar10 => Variant::Cifar,
                DatasetKind::ImageNet => Variant::ImageNet,
            },
        }
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(args: TrainArgs) -> Self {
        Self {
            epochs: args.epochs,
            start_epoch: args.start_epoch,
            batch_size: args.batch_size,
            lr: args.lr,
            momentum: args.momentum,
            weight_decay: args.weight_decay,
            print_freq: args.print_freq,
            layers: args.arch.layers,
            growth: args.arch.growth,
            droprate: args.arch.droprate,
            reduce: args.arch.reduce,
            bottleneck: !args.arch.no_bottleneck,
            augment: !args.no_augment,
            dataset: args.arch.dataset(),
            data_dir: args.data_dir,
            imagenet_dir: args.imagenet_dir,
            val_fraction: args.val_fraction,
            workers: args.workers,
            resume: args.resume,
            test: args.test,
            name: args.name,
            runs_dir: args.runs_dir,
            tensorboard: args.tensorboard,
            seed: args.seed,
            cpu: args.cpu,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging; RUST_LOG replaces the default level entirely
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => {
            let config = TrainConfig::from(args);
            config.validate()?;

            #[cfg(feature = "torch")]
            {
                densenet::training::run(config)?;
            }
            #[cfg(not(feature = "torch"))]
            {
                let _ = config;
                tracing::error!("Training requires the 'torch' feature. Rebuild with:");
                tracing::error!("  cargo build --features torch");
                tracing::error!("Note: libtorch must be installed, see the tch crate for setup.");
                anyhow::bail!("built without the 'torch' feature");
            }
        }
        Commands::Summary { arch } => {
            summary(&arch.model_config())?;
        }
    }

    Ok(())
}

/// `info` unless a valid `RUST_LOG` is given.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn summary(config: &DenseNetConfig) -> Result<()> {
    let plan = config.plan()?;
    let params = config.parameter_count()?;

    println!("DenseNet ({:?})", config.variant);
    println!(
        "  depth {}, growth {}, reduction {}, bottleneck {}, classes {}",
        config.depth, config.growth_rate, config.reduction, config.bottleneck, config.num_classes
    );
    println!("  stem: 3 -> {}", plan.stem_channels);
    for (i, stage) in plan.stages.iter().enumerate() {
        print!(
            "  block{}: {} layers, {} -> {}",
            i + 1,
            stage.num_layers,
            stage.in_channels,
            stage.block_channels
        );
        match stage.transition_channels {
            Some(out) => println!(", transition -> {}", out),
            None => println!(),
        }
    }
    println!("  classifier: {} -> {}", plan.feature_channels, plan.num_classes);
    println!(
        "Number of model parameters: {} ({})",
        params,
        abbreviate(params)
    );

    Ok(())
}
