//! Training module for the conditional WGAN-GP
//!
//! This module provides:
//! - Training loop implementation
//! - Wasserstein and auxiliary classification losses
//! - Gradient penalty
//! - Adam optimizer with clampable step counters
//! - Training metrics

mod losses;
mod metrics;
mod optim;
mod penalty;
mod trainer;

pub use losses::{
    accuracy_percent, classification_loss, correct_predictions, discriminator_loss_wasserstein,
    generator_loss_wasserstein,
};
pub use metrics::{BatchStats, EpochRecord, RunningMetrics, TrainingMetrics};
pub use optim::{Adam, AdamConfig, AdamState};
pub use penalty::{gradient_penalty, DEFAULT_LAMBDA};
pub use trainer::{evaluate_accuracy, Trainer, TrainingConfig, TrainingSummary};
