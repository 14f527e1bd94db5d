//! Labelled image datasets
//!
//! Images are stored as one float tensor of shape (N, 3, 32, 32) scaled to
//! [-1, 1], labels as an Int64 tensor of shape (N,).

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tch::{Device, Kind, Tensor};

use crate::error::{Error, Result};

/// Channels per image
pub const IMAGE_CHANNELS: i64 = 3;
/// Image side length
pub const IMAGE_SIZE: i64 = 32;

/// A batch of images with their labels
#[derive(Debug)]
pub struct Batch {
    /// Images (batch_size, 3, 32, 32)
    pub images: Tensor,
    /// Labels (batch_size,)
    pub labels: Tensor,
}

impl Batch {
    /// Number of samples in the batch
    pub fn len(&self) -> i64 {
        self.labels.size().first().copied().unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move both tensors to a device
    pub fn to_device(&self, device: Device) -> Batch {
        Batch {
            images: self.images.to_device(device),
            labels: self.labels.to_device(device),
        }
    }

    /// Verify the batch holds exactly `batch_size` images of the expected shape
    ///
    /// An undersized batch yields a recoverable [`Error::DataShapeError`].
    pub fn check_shape(&self, batch_size: i64) -> Result<()> {
        let expected = [batch_size, IMAGE_CHANNELS, IMAGE_SIZE, IMAGE_SIZE];
        let actual = self.images.size();
        if actual != expected {
            return Err(Error::shape(&expected, &actual));
        }

        let labels = self.labels.size();
        if labels != [batch_size] {
            return Err(Error::shape(&[batch_size], &labels));
        }

        Ok(())
    }
}

/// In-memory labelled image dataset
#[derive(Debug)]
pub struct ImageDataset {
    images: Tensor,
    labels: Tensor,
    num_classes: i64,
}

impl ImageDataset {
    /// Create a dataset, validating shapes and label range
    pub fn new(images: Tensor, labels: Tensor, num_classes: i64) -> Result<Self> {
        let size = images.size();
        if size.len() != 4 || size[1..] != [IMAGE_CHANNELS, IMAGE_SIZE, IMAGE_SIZE] {
            return Err(Error::shape(&[-1, IMAGE_CHANNELS, IMAGE_SIZE, IMAGE_SIZE], &size));
        }
        if labels.size() != [size[0]] {
            return Err(Error::shape(&[size[0]], &labels.size()));
        }
        if size[0] > 0 {
            let min = labels.min().int64_value(&[]);
            let max = labels.max().int64_value(&[]);
            if min < 0 || max >= num_classes {
                return Err(Error::DatasetError(format!(
                    "labels span [{}, {}], expected [0, {})",
                    min, max, num_classes
                )));
            }
        }

        Ok(Self {
            images: images.to_kind(Kind::Float),
            labels: labels.to_kind(Kind::Int64),
            num_classes,
        })
    }

    /// Build a synthetic dataset whose classes differ in colour and stripe frequency
    ///
    /// Labels cycle through `0..num_classes`, so every class is equally represented.
    pub fn synthetic(num_samples: i64, num_classes: i64, seed: u64) -> Result<Self> {
        if num_classes <= 0 {
            return Err(Error::ConfigError("number of classes must be > 0".into()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let pixels = (IMAGE_SIZE * IMAGE_SIZE) as usize;
        let mut data = Vec::with_capacity(num_samples as usize * IMAGE_CHANNELS as usize * pixels);
        let mut labels = Vec::with_capacity(num_samples as usize);

        for i in 0..num_samples {
            let label = i % num_classes;
            let phase = label as f32 / num_classes as f32 * std::f32::consts::TAU;
            let frequency = 1.0 + label as f32;

            for c in 0..IMAGE_CHANNELS {
                let tint = (phase + c as f32 * 2.0).cos() * 0.5;
                for p in 0..pixels {
                    let x = (p as i64 % IMAGE_SIZE) as f32 / IMAGE_SIZE as f32;
                    let stripe = (x * frequency * std::f32::consts::PI).sin() * 0.3;
                    let noise: f32 = rng.sample::<f32, _>(StandardNormal) * 0.1;
                    data.push((tint + stripe + noise).clamp(-1.0, 1.0));
                }
            }
            labels.push(label);
        }

        let images = Tensor::from_slice(&data).view([
            num_samples,
            IMAGE_CHANNELS,
            IMAGE_SIZE,
            IMAGE_SIZE,
        ]);
        Self::new(images, Tensor::from_slice(&labels), num_classes)
    }

    /// Number of samples
    pub fn len(&self) -> i64 {
        self.labels.size()[0]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of classes
    pub fn num_classes(&self) -> i64 {
        self.num_classes
    }

    /// All images
    pub fn images(&self) -> &Tensor {
        &self.images
    }

    /// All labels
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    /// Shallow copy sharing the underlying storage
    pub fn shallow_clone(&self) -> Self {
        Self {
            images: self.images.shallow_clone(),
            labels: self.labels.shallow_clone(),
            num_classes: self.num_classes,
        }
    }
}

/// Load the CIFAR-10 binary release from `dir`
///
/// Expects `data_batch_{1..5}.bin` and `test_batch.bin`.
///
/// # Returns
///
/// Tuple of (train, test) datasets with pixels scaled to [-1, 1]
pub fn load_cifar10(dir: &Path) -> Result<(ImageDataset, ImageDataset)> {
    let cifar = tch::vision::cifar::load_dir(dir).map_err(|e| {
        Error::DatasetError(format!("failed to load CIFAR-10 from {}: {}", dir.display(), e))
    })?;

    tracing::info!(
        "Loaded CIFAR-10: {} train / {} test images",
        cifar.train_images.size()[0],
        cifar.test_images.size()[0]
    );

    // The loader returns pixels in [0, 1]
    let train = ImageDataset::new(cifar.train_images * 2.0 - 1.0, cifar.train_labels, cifar.labels)?;
    let test = ImageDataset::new(cifar.test_images * 2.0 - 1.0, cifar.test_labels, cifar.labels)?;
    Ok((train, test))
}
