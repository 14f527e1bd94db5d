//! Conditional latent codes
//!
//! A latent code carries its class label one-hot encoded in the first
//! `num_classes` components; the remaining components are standard-normal noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tch::{Device, Kind, Tensor};

use crate::error::{Error, Result};

/// Seed of the fixed visualization batch
pub const FIXED_NOISE_SEED: u64 = 352;

/// Draws conditional latent codes and their labels
#[derive(Debug)]
pub struct NoiseSampler {
    latent_dim: i64,
    num_classes: i64,
    rng: StdRng,
}

impl NoiseSampler {
    /// Create a new sampler
    ///
    /// # Arguments
    ///
    /// * `latent_dim` - Length of a latent code
    /// * `num_classes` - Number of classes encoded in the code prefix
    /// * `seed` - Seed of the host-side random generator
    pub fn new(latent_dim: i64, num_classes: i64, seed: u64) -> Result<Self> {
        if num_classes <= 0 || latent_dim <= num_classes {
            return Err(Error::ConfigError(format!(
                "latent dimension ({}) must exceed the class count ({}) and classes must be > 0",
                latent_dim, num_classes
            )));
        }

        Ok(Self {
            latent_dim,
            num_classes,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Sample a batch of codes with independently drawn labels
    ///
    /// # Returns
    ///
    /// Tuple of codes (batch_size, latent_dim) and labels (batch_size,) as Int64
    pub fn sample(&mut self, batch_size: i64, device: Device) -> (Tensor, Tensor) {
        let labels: Vec<i64> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..self.num_classes))
            .collect();
        let codes = encode(&labels, self.latent_dim, self.num_classes, &mut self.rng);

        (codes.to_device(device), Tensor::from_slice(&labels).to_device(device))
    }

    /// Latent code length
    pub fn latent_dim(&self) -> i64 {
        self.latent_dim
    }

    /// Number of classes
    pub fn num_classes(&self) -> i64 {
        self.num_classes
    }
}

/// Build the fixed visualization batch: `per_class * num_classes` codes whose
/// label for row `i` is `i % num_classes`
pub fn fixed_noise(
    latent_dim: i64,
    num_classes: i64,
    per_class: i64,
    seed: u64,
    device: Device,
) -> Result<(Tensor, Tensor)> {
    // Reuses the sampler's validation
    NoiseSampler::new(latent_dim, num_classes, seed)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let labels: Vec<i64> = (0..per_class * num_classes).map(|i| i % num_classes).collect();
    let codes = encode(&labels, latent_dim, num_classes, &mut rng);

    Ok((codes.to_device(device), Tensor::from_slice(&labels).to_device(device)))
}

/// Noise rows with their label prefix overwritten by the one-hot encoding
fn encode(labels: &[i64], latent_dim: i64, num_classes: i64, rng: &mut StdRng) -> Tensor {
    let dim = latent_dim as usize;
    let mut data: Vec<f32> = (0..labels.len() * dim)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();

    for (row, &label) in data.chunks_mut(dim).zip(labels) {
        row[..num_classes as usize].fill(0.0);
        row[label as usize] = 1.0;
    }

    Tensor::from_slice(&data)
        .view([labels.len() as i64, latent_dim])
        .to_kind(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_prefix_matches_label() {
        let mut sampler = NoiseSampler::new(100, 10, 7).unwrap();
        let (codes, labels) = sampler.sample(64, Device::Cpu);

        assert_eq!(codes.size(), vec![64, 100]);
        assert_eq!(labels.size(), vec![64]);

        let prefix = codes.narrow(1, 0, 10);
        let sums = prefix.sum_dim_intlist([1].as_slice(), false, Kind::Float);
        let ones = Tensor::ones([64], (Kind::Float, Device::Cpu));
        assert!(sums.allclose(&ones, 1e-6, 1e-6, false));

        let hot = prefix.argmax(1, false);
        assert_eq!(hot.eq_tensor(&labels).all().int64_value(&[]), 1);

        let max_prefix = prefix.max().double_value(&[]);
        let min_prefix = prefix.min().double_value(&[]);
        assert_eq!(max_prefix, 1.0);
        assert_eq!(min_prefix, 0.0);
    }

    #[test]
    fn test_labels_in_range() {
        let mut sampler = NoiseSampler::new(100, 10, 11).unwrap();
        let (_, labels) = sampler.sample(500, Device::Cpu);

        assert!(labels.min().int64_value(&[]) >= 0);
        assert!(labels.max().int64_value(&[]) < 10);
    }

    #[test]
    fn test_consecutive_batches_differ() {
        let mut sampler = NoiseSampler::new(100, 10, 3).unwrap();
        let (first, _) = sampler.sample(16, Device::Cpu);
        let (second, _) = sampler.sample(16, Device::Cpu);

        assert!(!first.allclose(&second, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_fixed_noise_layout() {
        let (codes, labels) = fixed_noise(100, 10, 10, FIXED_NOISE_SEED, Device::Cpu).unwrap();

        assert_eq!(codes.size(), vec![100, 100]);
        let labels: Vec<i64> = Vec::<i64>::try_from(&labels).unwrap();
        for (i, label) in labels.iter().enumerate() {
            assert_eq!(*label, (i % 10) as i64);
        }

        let counts = Tensor::from_slice(&labels).bincount::<Tensor>(None, 10);
        let expected = Tensor::full([10], 10i64, (Kind::Int64, Device::Cpu));
        assert!(counts.equal(&expected));
    }

    #[test]
    fn test_fixed_noise_is_reproducible() {
        let (a, _) = fixed_noise(100, 10, 10, FIXED_NOISE_SEED, Device::Cpu).unwrap();
        let (b, _) = fixed_noise(100, 10, 10, FIXED_NOISE_SEED, Device::Cpu).unwrap();

        assert!(a.equal(&b));
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(NoiseSampler::new(10, 10, 0).is_err());
        assert!(NoiseSampler::new(100, 0, 0).is_err());
        assert!(fixed_noise(5, 10, 10, 0, Device::Cpu).is_err());
    }
}
