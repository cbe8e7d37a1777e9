//! Seeded train/validation split.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Split `0..len` into disjoint (train, val) index sets.
///
/// The validation set holds `floor(val_fraction * len)` samples; the rest go
/// to training. Both sets are drawn from one seeded permutation.
pub fn random_split(len: usize, val_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let val_size = ((val_fraction.clamp(0.0, 1.0)) * len as f64).floor() as usize;
    let train_size = len - val_size.min(len);

    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let val = indices.split_off(train_size);
    (indices, val)
}
