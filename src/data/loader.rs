//! DataLoader for batching and iterating over image datasets
//!
//! Provides batching for GAN training with support for:
//! - Seeded shuffling per epoch
//! - Drop last incomplete batch
//! - Optional augmentation of every batch
//! - Background prefetching through a bounded channel

use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tch::Tensor;

use super::augmentation::Augmentation;
use super::dataset::{Batch, ImageDataset};

/// DataLoader for iterating over batched images
pub struct DataLoader {
    /// Full dataset
    dataset: ImageDataset,
    /// Batch size
    batch_size: usize,
    /// Whether to shuffle data each epoch
    shuffle: bool,
    /// Whether to drop the last incomplete batch
    drop_last: bool,
    /// Augmentation applied to every batch
    augmentation: Option<Augmentation>,
    /// Number of batches prepared ahead on a worker thread (0 = inline)
    prefetch: usize,
    /// Source of shuffling and augmentation randomness
    rng: StdRng,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `dataset` - Images and labels to iterate over
    /// * `batch_size` - Number of images per batch
    /// * `shuffle` - Whether to shuffle data each epoch
    /// * `drop_last` - Whether to drop incomplete final batch
    /// * `seed` - Seed for shuffling and augmentation
    pub fn new(
        dataset: ImageDataset,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
        seed: u64,
    ) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle,
            drop_last,
            augmentation: None,
            prefetch: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Augment every batch
    pub fn with_augmentation(mut self, augmentation: Augmentation) -> Self {
        self.augmentation = Some(augmentation);
        self
    }

    /// Prepare up to `depth` batches ahead on a worker thread
    pub fn with_prefetch(mut self, depth: usize) -> Self {
        self.prefetch = depth;
        self
    }

    /// Get the number of batches per epoch
    pub fn num_batches(&self) -> usize {
        let num_samples = self.num_samples();
        if self.drop_last {
            num_samples / self.batch_size
        } else {
            (num_samples + self.batch_size - 1) / self.batch_size
        }
    }

    /// Get total number of samples
    pub fn num_samples(&self) -> usize {
        self.dataset.len() as usize
    }

    /// Batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &ImageDataset {
        &self.dataset
    }

    /// Start a new epoch
    ///
    /// Reshuffles when enabled. The returned iterator owns everything it
    /// needs, so batches can be produced on a worker thread.
    pub fn iter(&mut self) -> Batches {
        let mut indices: Vec<i64> = (0..self.dataset.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut self.rng);
        }

        let plan = BatchPlan {
            images: self.dataset.images().shallow_clone(),
            labels: self.dataset.labels().shallow_clone(),
            indices,
            batch_size: self.batch_size,
            drop_last: self.drop_last,
            position: 0,
            augmentation: self.augmentation,
            rng: StdRng::seed_from_u64(self.rng.gen()),
        };

        if self.prefetch == 0 {
            return Batches::Inline(plan);
        }

        let (sender, receiver) = sync_channel(self.prefetch);
        let worker = std::thread::spawn(move || {
            for batch in plan {
                if sender.send(batch).is_err() {
                    break;
                }
            }
        });

        Batches::Prefetched {
            receiver: Some(receiver),
            worker: Some(worker),
        }
    }
}

/// Index order and cursor of one epoch
pub struct BatchPlan {
    images: Tensor,
    labels: Tensor,
    indices: Vec<i64>,
    batch_size: usize,
    drop_last: bool,
    position: usize,
    augmentation: Option<Augmentation>,
    rng: StdRng,
}

impl Iterator for BatchPlan {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let start = self.position;
        if start >= self.indices.len() {
            return None;
        }

        let end = (start + self.batch_size).min(self.indices.len());
        if self.drop_last && end - start < self.batch_size {
            return None;
        }
        self.position = end;

        let index = Tensor::from_slice(&self.indices[start..end]);
        let mut images = self.images.index_select(0, &index);
        let labels = self.labels.index_select(0, &index);

        if let Some(augmentation) = &self.augmentation {
            images = tch::no_grad(|| augmentation.apply(&images, &mut self.rng));
        }

        Some(Batch { images, labels })
    }
}

/// Iterator over the batches of one epoch
pub enum Batches {
    /// Batches built on the calling thread
    Inline(BatchPlan),
    /// Batches built ahead on a worker thread
    Prefetched {
        receiver: Option<Receiver<Batch>>,
        worker: Option<JoinHandle<()>>,
    },
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        match self {
            Batches::Inline(plan) => plan.next(),
            Batches::Prefetched { receiver, .. } => receiver.as_ref()?.recv().ok(),
        }
    }
}

impl Drop for Batches {
    fn drop(&mut self) {
        if let Batches::Prefetched { receiver, worker } = self {
            // Unblock the worker before waiting on it
            receiver.take();
            if let Some(worker) = worker.take() {
                if worker.join().is_err() {
                    tracing::warn!("Prefetch worker panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: i64) -> ImageDataset {
        ImageDataset::synthetic(n, 10, 3).unwrap()
    }

    fn sorted_labels(batches: &[Batch]) -> Vec<i64> {
        let labels = Tensor::cat(&batches.iter().map(|b| &b.labels).collect::<Vec<_>>(), 0);
        let mut values: Vec<i64> = Vec::try_from(&labels).unwrap();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_dataloader_basic() {
        let mut loader = DataLoader::new(dataset(256), 100, false, false, 0);

        assert_eq!(loader.num_batches(), 3);
        assert_eq!(loader.num_samples(), 256);

        let sizes: Vec<i64> = loader.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 56]);
    }

    #[test]
    fn test_dataloader_drop_last() {
        let mut loader = DataLoader::new(dataset(256), 100, false, true, 0);

        assert_eq!(loader.num_batches(), 2);
        let batches: Vec<Batch> = loader.iter().collect();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 100));
    }

    #[test]
    fn test_shuffle_keeps_sample_set() {
        let mut ordered = DataLoader::new(dataset(50), 16, false, false, 0);
        let mut shuffled = DataLoader::new(dataset(50), 16, true, false, 0);

        let first: Vec<Batch> = ordered.iter().collect();
        let second: Vec<Batch> = shuffled.iter().collect();

        assert!(!first[0].labels.equal(&second[0].labels));
        assert_eq!(sorted_labels(&first), sorted_labels(&second));
    }

    #[test]
    fn test_prefetch_yields_same_batches() {
        let mut inline = DataLoader::new(dataset(64), 10, true, false, 11);
        let mut prefetched = DataLoader::new(dataset(64), 10, true, false, 11).with_prefetch(2);

        let a: Vec<Batch> = inline.iter().collect();
        let b: Vec<Batch> = prefetched.iter().collect();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!(x.images.equal(&y.images));
            assert!(x.labels.equal(&y.labels));
        }
    }

    #[test]
    fn test_dropping_prefetch_iterator_early() {
        let mut loader = DataLoader::new(dataset(100), 5, false, false, 0).with_prefetch(1);

        let mut batches = loader.iter();
        assert!(batches.next().is_some());
        drop(batches);

        assert_eq!(loader.iter().count(), 20);
    }

    #[test]
    fn test_augmented_batches_keep_shape() {
        let mut loader =
            DataLoader::new(dataset(20), 8, true, true, 1).with_augmentation(Augmentation::default());

        for batch in loader.iter() {
            assert_eq!(batch.images.size(), vec![8, 3, 32, 32]);
        }
    }
}
