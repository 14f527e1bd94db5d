//! Data module for loading and batching labelled images
//!
//! This module provides:
//! - In-memory image datasets (CIFAR-10 or synthetic)
//! - Training-time augmentation
//! - DataLoader for batching with optional prefetching

mod augmentation;
mod dataset;
mod loader;

pub use augmentation::Augmentation;
pub use dataset::{load_cifar10, Batch, ImageDataset, IMAGE_CHANNELS, IMAGE_SIZE};
pub use loader::{Batches, DataLoader};
