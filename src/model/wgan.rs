//! Conditional WGAN wrapper combining Generator and Discriminator
//!
//! Owns one variable store per network, so each optimizer only ever sees
//! the parameters of its own network.

use std::path::Path;

use tch::{nn::VarStore, Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use crate::error::{Error, Result};

/// Complete conditional WGAN model
pub struct ConditionalWgan {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl ConditionalWgan {
    /// Create a new model pair
    pub fn new(gen_config: GeneratorConfig, disc_config: DiscriminatorConfig, device: Device) -> Self {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config);
        let discriminator = Discriminator::new(&disc_vs.root(), disc_config);

        Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        }
    }

    /// Create a model pair sharing width, latent size and class count
    ///
    /// # Arguments
    ///
    /// * `latent_dim` - Size of latent code
    /// * `num_classes` - Number of image classes
    /// * `channels` - Hidden channel width of both networks
    /// * `device` - Device to create model on
    pub fn with_defaults(latent_dim: i64, num_classes: i64, channels: i64, device: Device) -> Self {
        let gen_config = GeneratorConfig {
            latent_dim,
            channels,
            ..Default::default()
        };

        let disc_config = DiscriminatorConfig {
            channels,
            num_classes,
            ..Default::default()
        };

        Self::new(gen_config, disc_config, device)
    }

    /// Generate images in evaluation mode without gradient tracking
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.generator.generate(noise))
    }

    /// Trainable generator parameters
    pub fn generator_parameters(&self) -> Vec<Tensor> {
        self.gen_vs.trainable_variables()
    }

    /// Trainable discriminator parameters
    pub fn discriminator_parameters(&self) -> Vec<Tensor> {
        self.disc_vs.trainable_variables()
    }

    /// Save both networks, overwriting existing files
    pub fn save(&self, gen_path: &Path, disc_path: &Path) -> Result<()> {
        save_store(&self.gen_vs, gen_path)?;
        save_store(&self.disc_vs, disc_path)
    }

    /// Load both networks
    pub fn load(&mut self, gen_path: &Path, disc_path: &Path) -> Result<()> {
        self.load_generator(gen_path)?;
        self.load_discriminator(disc_path)
    }

    /// Load generator weights only
    pub fn load_generator(&mut self, path: &Path) -> Result<()> {
        self.gen_vs.load(path).map_err(|source| Error::CheckpointIoError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load discriminator weights only
    pub fn load_discriminator(&mut self, path: &Path) -> Result<()> {
        self.disc_vs.load(path).map_err(|source| Error::CheckpointIoError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.config().latent_dim
    }

    /// Get number of classes
    pub fn num_classes(&self) -> i64 {
        self.discriminator.config().num_classes
    }
}

fn save_store(vs: &VarStore, path: &Path) -> Result<()> {
    vs.save(path).map_err(|source| Error::CheckpointIoError {
        path: path.to_path_buf(),
        source,
    })
}
