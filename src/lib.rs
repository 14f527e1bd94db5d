//! # Auxiliary-Classifier Conditional WGAN-GP
//!
//! This crate trains a class-conditional image generator against a
//! discriminator with two heads: a Wasserstein critic regularized by a
//! gradient penalty, and an auxiliary classifier over the image classes.
//! Images are 32x32 RGB with 10 classes (CIFAR-10 layout).
//!
//! ## Modules
//!
//! - `data`: Datasets, augmentation and batch loading
//! - `model`: Generator, Discriminator and conditional noise sampling
//! - `training`: Training loop, losses, gradient penalty and optimizer
//! - `utils`: Configuration, checkpoints, logging and sample grids

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{load_cifar10, Augmentation, DataLoader, ImageDataset};
pub use error::{Error, Result};
pub use model::{ConditionalWgan, Discriminator, Generator, NoiseSampler};
pub use training::{Trainer, TrainingConfig, TrainingMetrics, TrainingSummary};
pub use utils::{load_checkpoint, save_checkpoint, CheckpointPaths, Config, RunLog};
