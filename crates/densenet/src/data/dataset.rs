//! Tensor datasets and batch loading.

use super::folder::{load_rgb, ClassFolder};
use super::sampler::BatchSampler;
use super::split::random_split;
use super::transforms::Pipeline;
use crate::config::{DatasetKind, TrainConfig};
use crate::{DenseNetError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::Path;
use std::rc::Rc;
use tch::{Kind, Tensor};

/// Random-access collection of labelled images.
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn num_classes(&self) -> i64;

    /// Sample `index` as a float `[3, H, W]` image in `[0, 1]` and its label.
    fn get(&self, index: usize) -> Result<(Tensor, i64)>;

    /// Several samples at once; implementations may decode in parallel.
    fn get_many(&self, indices: &[usize]) -> Result<Vec<(Tensor, i64)>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }
}

/// CIFAR-10 held fully in memory.
pub struct Cifar10 {
    images: Tensor,
    labels: Vec<i64>,
}

impl Cifar10 {
    pub const BATCHES_DIR: &'static str = "cifar-10-batches-bin";

    /// Load the (train, test) sets from `<data_dir>/cifar-10-batches-bin`.
    pub fn load_splits(data_dir: impl AsRef<Path>) -> Result<(Self, Self)> {
        let dir = data_dir.as_ref().join(Self::BATCHES_DIR);
        if !dir.is_dir() {
            return Err(DenseNetError::Data(format!(
                "CIFAR-10 binary batches not found at {}; extract cifar-10-binary.tar.gz \
                 from https://www.cs.toronto.edu/~kriz/cifar.html into {}",
                dir.display(),
                data_dir.as_ref().display()
            )));
        }

        tracing::info!(path = %dir.display(), "Loading CIFAR-10");
        let ds = tch::vision::cifar::load_dir(&dir)?;
        let train = Self::new(ds.train_images, &ds.train_labels)?;
        let test = Self::new(ds.test_images, &ds.test_labels)?;
        tracing::info!(train = train.len(), test = test.len(), "Loaded CIFAR-10");
        Ok((train, test))
    }

    fn new(images: Tensor, labels: &Tensor) -> Result<Self> {
        let labels = Vec::<i64>::try_from(&labels.to_kind(Kind::Int64))?;
        let n = images.size().first().copied().unwrap_or(0);
        if n != labels.len() as i64 {
            return Err(DenseNetError::Data(format!(
                "CIFAR-10 image/label count mismatch: {} vs {}",
                n,
                labels.len()
            )));
        }
        Ok(Self { images, labels })
    }
}

impl Dataset for Cifar10 {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn num_classes(&self) -> i64 {
        10
    }

    fn get(&self, index: usize) -> Result<(Tensor, i64)> {
        let label = *self.labels.get(index).ok_or_else(|| {
            DenseNetError::Data(format!("index {} out of range ({})", index, self.len()))
        })?;
        Ok((self.images.get(index as i64), label))
    }
}

/// Image folder decoded lazily on a dedicated rayon pool.
pub struct ImageFolder {
    folder: ClassFolder,
    pool: rayon::ThreadPool,
}

impl ImageFolder {
    pub fn new(root: impl AsRef<Path>, workers: usize) -> Result<Self> {
        let folder = ClassFolder::scan(root)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("decode-{}", i))
            .build()
            .map_err(|e| DenseNetError::Data(format!("failed to start decode pool: {}", e)))?;
        tracing::info!(
            root = %folder.root().display(),
            classes = folder.classes().len(),
            images = folder.len(),
            "Indexed image folder"
        );
        Ok(Self { folder, pool })
    }

    pub fn classes(&self) -> &[String] {
        self.folder.classes()
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.folder.len()
    }

    fn num_classes(&self) -> i64 {
        self.folder.classes().len() as i64
    }

    fn get(&self, index: usize) -> Result<(Tensor, i64)> {
        let (path, label) = self.folder.samples().get(index).ok_or_else(|| {
            DenseNetError::Data(format!("index {} out of range ({})", index, self.len()))
        })?;
        let rgb = load_rgb(path)?;
        let (w, h) = rgb.dimensions();
        let img = Tensor::from_slice(rgb.as_raw())
            .view([h as i64, w as i64, 3])
            .permute([2, 0, 1])
            .to_kind(Kind::Float)
            / 255.0;
        Ok((img, *label))
    }

    fn get_many(&self, indices: &[usize]) -> Result<Vec<(Tensor, i64)>> {
        self.pool
            .install(|| indices.par_iter().map(|&i| self.get(i)).collect())
    }
}

/// Batches over an index view of a shared dataset, with its own pipeline.
pub struct DataLoader {
    dataset: Rc<dyn Dataset>,
    pipeline: Pipeline,
    sampler: BatchSampler,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(
        dataset: Rc<dyn Dataset>,
        indices: Vec<usize>,
        pipeline: Pipeline,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Self {
        Self {
            dataset,
            pipeline,
            sampler: BatchSampler::new(indices, batch_size, shuffle, seed),
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
        }
    }

    /// Loader over the whole dataset.
    pub fn full(
        dataset: Rc<dyn Dataset>,
        pipeline: Pipeline,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Self {
        let indices = (0..dataset.len()).collect();
        Self::new(dataset, indices, pipeline, batch_size, shuffle, seed)
    }

    /// Samples per epoch.
    pub fn len(&self) -> usize {
        self.sampler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }

    pub fn num_batches(&self) -> usize {
        self.sampler.num_batches()
    }

    /// Rewind (and reshuffle) for a new epoch.
    pub fn reset(&mut self) {
        self.sampler.reset();
    }

    /// Next `(images [B, 3, H, W], labels [B])` batch on the CPU.
    pub fn next_batch(&mut self) -> Result<Option<(Tensor, Tensor)>> {
        let Some(indices) = self.sampler.next_batch() else {
            return Ok(None);
        };

        let samples = self.dataset.get_many(&indices)?;
        let mut images = Vec::with_capacity(samples.len());
        let mut labels = Vec::with_capacity(samples.len());
        for (img, label) in samples {
            images.push(self.pipeline.apply(&img, &mut self.rng)?);
            labels.push(label);
        }

        let images = Tensor::f_stack(&images, 0)?;
        Ok(Some((images, Tensor::from_slice(&labels))))
    }
}

/// Train, validation and optional test loaders for a run.
pub struct DataSplits {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: Option<DataLoader>,
}

impl DataSplits {
    pub fn build(config: &TrainConfig) -> Result<Self> {
        let train_pipeline = Pipeline::train(config.dataset, config.augment);
        let eval_pipeline = Pipeline::eval(config.dataset);
        let bs = config.batch_size;
        let seed = config.seed;

        match config.dataset {
            DatasetKind::Cifar10 => {
                let (train_set, test_set) = Cifar10::load_splits(&config.data_dir)?;
                let train_set: Rc<dyn Dataset> = Rc::new(train_set);
                let (train_idx, val_idx) =
                    random_split(train_set.len(), config.val_fraction, seed);
                tracing::info!(
                    train = train_idx.len(),
                    val = val_idx.len(),
                    "Split CIFAR-10 train set"
                );

                // The held-out split shares the training pipeline with its parent set.
                let train = DataLoader::new(
                    Rc::clone(&train_set),
                    train_idx,
                    train_pipeline.clone(),
                    bs,
                    true,
                    seed.wrapping_add(1),
                );
                let val = DataLoader::new(
                    train_set,
                    val_idx,
                    train_pipeline,
                    bs,
                    true,
                    seed.wrapping_add(2),
                );
                let test = DataLoader::full(
                    Rc::new(test_set),
                    eval_pipeline,
                    bs,
                    true,
                    seed.wrapping_add(3),
                );
                Ok(Self {
                    train,
                    val,
                    test: Some(test),
                })
            }
            DatasetKind::ImageNet => {
                let train_set = ImageFolder::new(config.imagenet_dir.join("train"), config.workers)?;
                let val_set = ImageFolder::new(config.imagenet_dir.join("val"), config.workers)?;
                if train_set.num_classes() != config.num_classes() {
                    tracing::warn!(
                        found = train_set.num_classes(),
                        expected = config.num_classes(),
                        "ImageNet train folder has an unexpected number of classes"
                    );
                }
                if train_set.classes() != val_set.classes() {
                    return Err(DenseNetError::Data(
                        "ImageNet train and val folders have different classes".into(),
                    ));
                }

                let train = DataLoader::full(
                    Rc::new(train_set),
                    train_pipeline,
                    bs,
                    true,
                    seed.wrapping_add(1),
                );
                let val = DataLoader::full(
                    Rc::new(val_set),
                    eval_pipeline,
                    bs,
                    true,
                    seed.wrapping_add(2),
                );
                Ok(Self {
                    train,
                    val,
                    test: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transforms::Pipeline;
    use tch::Device;

    struct Synthetic {
        n: usize,
    }

    impl Dataset for Synthetic {
        fn len(&self) -> usize {
            self.n
        }

        fn num_classes(&self) -> i64 {
            10
        }

        fn get(&self, index: usize) -> Result<(Tensor, i64)> {
            let img = Tensor::full([3, 32, 32], index as f64 / self.n as f64, (Kind::Float, Device::Cpu));
            Ok((img, (index % 10) as i64))
        }
    }

    #[test]
    fn test_loader_batches() {
        let ds: Rc<dyn Dataset> = Rc::new(Synthetic { n: 10 });
        let mut loader = DataLoader::full(ds, Pipeline::eval(DatasetKind::Cifar10), 4, false, 0);
        assert_eq!(loader.num_batches(), 3);

        let (images, labels) = loader.next_batch().unwrap().unwrap();
        assert_eq!(images.size(), vec![4, 3, 32, 32]);
        assert_eq!(Vec::<i64>::try_from(&labels).unwrap(), vec![0, 1, 2, 3]);

        loader.next_batch().unwrap().unwrap();
        let (images, _) = loader.next_batch().unwrap().unwrap();
        assert_eq!(images.size()[0], 2);
        assert!(loader.next_batch().unwrap().is_none());

        loader.reset();
        assert!(loader.next_batch().unwrap().is_some());
    }

    #[test]
    fn test_loader_over_subset() {
        let ds: Rc<dyn Dataset> = Rc::new(Synthetic { n: 20 });
        let mut loader = DataLoader::new(
            ds,
            vec![3, 13],
            Pipeline::train(DatasetKind::Cifar10, true),
            8,
            true,
            9,
        );
        let (images, labels) = loader.next_batch().unwrap().unwrap();
        assert_eq!(images.size(), vec![2, 3, 32, 32]);
        assert_eq!(Vec::<i64>::try_from(&labels).unwrap(), vec![3, 3]);
    }

    #[test]
    fn test_image_folder_decodes_to_chw() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbImage::from_fn(5, 3, |x, _| image::Rgb([if x == 0 { 255 } else { 0 }, 0, 0]));
        for (class, ext) in [("cat", "tiff"), ("dog", "webp")] {
            std::fs::create_dir_all(dir.path().join(class)).unwrap();
            img.save(dir.path().join(class).join(format!("a.{}", ext))).unwrap();
        }

        let folder = ImageFolder::new(dir.path(), 2).unwrap();
        let samples = folder.get_many(&[0, 1]).unwrap();
        for (i, (tensor, label)) in samples.iter().enumerate() {
            assert_eq!(*label, i as i64);
            assert_eq!(tensor.size(), vec![3, 3, 5]);
            assert_eq!(tensor.double_value(&[0, 1, 0]), 1.0);
            assert_eq!(tensor.double_value(&[0, 1, 1]), 0.0);
        }
    }

    #[test]
    fn test_missing_cifar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Cifar10::load_splits(dir.path()).err().unwrap();
        assert!(err.to_string().contains(Cifar10::BATCHES_DIR));
    }
}
