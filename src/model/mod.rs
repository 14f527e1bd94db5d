//! Model module containing the conditional WGAN components
//!
//! This module provides:
//! - Generator network mapping conditional latent codes to images
//! - Discriminator network with critic and classifier heads
//! - Conditional noise sampling
//! - ConditionalWgan wrapper owning both networks

mod discriminator;
mod generator;
mod noise;
mod wgan;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};
pub use noise::{fixed_noise, NoiseSampler, FIXED_NOISE_SEED};
pub use wgan::ConditionalWgan;
