//! Mini-batch index sampling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Yields batches of dataset indices, reshuffling on every reset when enabled.
///
/// The last batch of an epoch may be shorter than `batch_size`.
pub struct BatchSampler {
    indices: Vec<usize>,
    batch_size: usize,
    current_pos: usize,
    shuffle: bool,
    rng: StdRng,
}

impl BatchSampler {
    pub fn new(indices: Vec<usize>, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        let mut sampler = Self {
            indices,
            batch_size: batch_size.max(1),
            current_pos: 0,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        };
        sampler.reset();
        sampler
    }

    /// Number of samples per epoch.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Rewind for a new epoch.
    pub fn reset(&mut self) {
        self.current_pos = 0;
        if self.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    pub fn next_batch(&mut self) -> Option<Vec<usize>> {
        if self.current_pos >= self.indices.len() {
            return None;
        }

        let end = (self.current_pos + self.batch_size).min(self.indices.len());
        let batch = self.indices[self.current_pos..end].to_vec();
        self.current_pos = end;

        Some(batch)
    }
}

impl Iterator for BatchSampler {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_cover_epoch() {
        let sampler = BatchSampler::new((0..10).collect(), 4, false, 0);
        assert_eq!(sampler.num_batches(), 3);

        let batches: Vec<_> = sampler.collect();
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[test]
    fn test_shuffle_is_permutation_and_changes_per_epoch() {
        let mut sampler = BatchSampler::new((0..64).collect(), 64, true, 3);
        let first = sampler.next_batch().unwrap();
        assert!(sampler.next_batch().is_none());

        sampler.reset();
        let second = sampler.next_batch().unwrap();

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, (0..64).collect::<Vec<_>>());
        assert_ne!(first, second);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let sampler = BatchSampler::new(vec![5, 6], 0, false, 0);
        assert_eq!(sampler.num_batches(), 2);
    }
}
