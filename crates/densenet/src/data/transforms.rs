//! Image transforms and the standard train/eval pipelines.
//!
//! Random parameters are sampled on the Rust side so they are reproducible
//! from the run seed; applying them to tensors requires the `torch` feature.
//! Images are float `[3, H, W]` tensors in `[0, 1]`.

use crate::config::DatasetKind;
use rand::Rng;

/// ImageNet channel statistics.
pub const MEAN: [f64; 3] = [0.485, 0.456, 0.406];
pub const STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Region of an image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBox {
    pub top: i64,
    pub left: i64,
    pub height: i64,
    pub width: i64,
}

/// Zero-pad by `padding` on every side, then crop `size x size` at random.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomCrop {
    pub size: i64,
    pub padding: i64,
}

impl RandomCrop {
    /// Crop box in padded coordinates.
    pub fn sample<R: Rng>(&self, height: i64, width: i64, rng: &mut R) -> CropBox {
        let h = height + 2 * self.padding;
        let w = width + 2 * self.padding;
        let top = rng.gen_range(0..=(h - self.size).max(0));
        let left = rng.gen_range(0..=(w - self.size).max(0));
        CropBox {
            top,
            left,
            height: self.size.min(h),
            width: self.size.min(w),
        }
    }
}

/// Mirror left-right with probability `p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HorizontalFlip {
    pub p: f64,
}

impl HorizontalFlip {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.p.clamp(0.0, 1.0))
    }
}

/// Crop a random area/aspect-ratio region, then resize it to `size x size`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomResizedCrop {
    pub size: i64,
    pub scale: (f64, f64),
    pub ratio: (f64, f64),
}

impl RandomResizedCrop {
    pub fn new(size: i64) -> Self {
        Self {
            size,
            scale: (0.08, 1.0),
            ratio: (3.0 / 4.0, 4.0 / 3.0),
        }
    }

    pub fn sample<R: Rng>(&self, height: i64, width: i64, rng: &mut R) -> CropBox {
        let area = (height * width) as f64;
        let log_ratio = (self.ratio.0.ln(), self.ratio.1.ln());

        for _ in 0..10 {
            let target_area = area * rng.gen_range(self.scale.0..=self.scale.1);
            let aspect = rng.gen_range(log_ratio.0..=log_ratio.1).exp();

            let w = (target_area * aspect).sqrt().round() as i64;
            let h = (target_area / aspect).sqrt().round() as i64;
            if 0 < w && w <= width && 0 < h && h <= height {
                return CropBox {
                    top: rng.gen_range(0..=height - h),
                    left: rng.gen_range(0..=width - w),
                    height: h,
                    width: w,
                };
            }
        }

        // Fallback to a central crop clamped to the ratio range
        let in_ratio = width as f64 / height as f64;
        let (h, w) = if in_ratio < self.ratio.0 {
            ((width as f64 / self.ratio.0).round() as i64, width)
        } else if in_ratio > self.ratio.1 {
            (height, (height as f64 * self.ratio.1).round() as i64)
        } else {
            (height, width)
        };
        CropBox {
            top: (height - h) / 2,
            left: (width - w) / 2,
            height: h,
            width: w,
        }
    }
}

/// Output size when the shorter side is resized to `size`, keeping aspect.
pub fn resized_dims(height: i64, width: i64, size: i64) -> (i64, i64) {
    if height <= width {
        (size, (size as f64 * width as f64 / height as f64) as i64)
    } else {
        ((size as f64 * height as f64 / width as f64) as i64, size)
    }
}

/// Half of `n`, with .5 rounded to the even neighbour.
fn half_round_even(n: i64) -> i64 {
    let half = n.div_euclid(2);
    if n.rem_euclid(2) == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

/// Centered `size x size` box.
pub fn center_crop_box(height: i64, width: i64, size: i64) -> CropBox {
    CropBox {
        top: half_round_even(height - size),
        left: half_round_even(width - size),
        height: size,
        width: size,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    RandomCrop(RandomCrop),
    HorizontalFlip(HorizontalFlip),
    RandomResizedCrop(RandomResizedCrop),
    /// Resize the shorter side
    Resize(i64),
    CenterCrop(i64),
    Normalize { mean: [f64; 3], std: [f64; 3] },
}

fn normalize() -> Transform {
    Transform::Normalize {
        mean: MEAN,
        std: STD,
    }
}

/// Ordered list of transforms applied to every sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    transforms: Vec<Transform>,
}

impl Pipeline {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    /// Training pipeline for a dataset.
    pub fn train(kind: DatasetKind, augment: bool) -> Self {
        let flip = Transform::HorizontalFlip(HorizontalFlip { p: 0.5 });
        let transforms = match (kind, augment) {
            (DatasetKind::Cifar10, true) => vec![
                Transform::RandomCrop(RandomCrop {
                    size: 32,
                    padding: 4,
                }),
                flip,
                normalize(),
            ],
            (DatasetKind::ImageNet, true) => vec![
                Transform::RandomResizedCrop(RandomResizedCrop::new(224)),
                flip,
                normalize(),
            ],
            (_, false) => vec![normalize()],
        };
        Self::new(transforms)
    }

    /// Evaluation pipeline for a dataset.
    pub fn eval(kind: DatasetKind) -> Self {
        let transforms = match kind {
            DatasetKind::Cifar10 => vec![normalize()],
            DatasetKind::ImageNet => vec![
                Transform::Resize(256),
                Transform::CenterCrop(224),
                normalize(),
            ],
        };
        Self::new(transforms)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }
}

#[cfg(feature = "torch")]
mod apply {
    use super::*;
    use crate::Result;
    use tch::{Kind, Tensor};

    fn crop(img: &Tensor, b: CropBox) -> Tensor {
        img.narrow(1, b.top, b.height).narrow(2, b.left, b.width)
    }

    fn resize(img: &Tensor, height: i64, width: i64) -> Tensor {
        img.unsqueeze(0)
            .upsample_bilinear2d([height, width], false, None::<f64>, None::<f64>)
            .squeeze_dim(0)
    }

    fn dims(img: &Tensor) -> (i64, i64) {
        let size = img.size();
        (size[size.len() - 2], size[size.len() - 1])
    }

    impl Transform {
        pub fn apply<R: Rng>(&self, img: &Tensor, rng: &mut R) -> Result<Tensor> {
            let (h, w) = dims(img);
            let out = match self {
                Transform::RandomCrop(t) => {
                    let b = t.sample(h, w, rng);
                    let p = t.padding;
                    crop(&img.constant_pad_nd([p, p, p, p]), b)
                }
                Transform::HorizontalFlip(t) => {
                    if t.sample(rng) {
                        img.flip([2])
                    } else {
                        img.shallow_clone()
                    }
                }
                Transform::RandomResizedCrop(t) => {
                    let b = t.sample(h, w, rng);
                    resize(&crop(img, b), t.size, t.size)
                }
                Transform::Resize(size) => {
                    let (nh, nw) = resized_dims(h, w, *size);
                    resize(img, nh, nw)
                }
                Transform::CenterCrop(size) => {
                    if h < *size || w < *size {
                        return Err(crate::DenseNetError::Data(format!(
                            "cannot center-crop {}x{} image to {}",
                            h, w, size
                        )));
                    }
                    crop(img, center_crop_box(h, w, *size))
                }
                Transform::Normalize { mean, std } => {
                    let mean = Tensor::from_slice(mean)
                        .to_kind(Kind::Float)
                        .view([3, 1, 1])
                        .to_device(img.device());
                    let std = Tensor::from_slice(std)
                        .to_kind(Kind::Float)
                        .view([3, 1, 1])
                        .to_device(img.device());
                    (img - mean) / std
                }
            };
            Ok(out)
        }
    }

    impl Pipeline {
        pub fn apply<R: Rng>(&self, img: &Tensor, rng: &mut R) -> Result<Tensor> {
            let mut out = img.shallow_clone();
            for t in &self.transforms {
                out = t.apply(&out, rng)?;
            }
            Ok(out)
        }
    }
}
