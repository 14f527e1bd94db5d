//! Loss functions for conditional WGAN training
//!
//! Wasserstein critic terms plus the auxiliary classification loss shared by
//! both networks.

use tch::{Kind, Tensor};

/// Wasserstein loss for generator
///
/// Generator loss: -E[D(G(z))]
pub fn generator_loss_wasserstein(fake_output: &Tensor) -> Tensor {
    -fake_output.mean(Kind::Float)
}

/// Wasserstein loss for discriminator
///
/// Discriminator loss: E[D(G(z))] - E[D(x)]
pub fn discriminator_loss_wasserstein(real_output: &Tensor, fake_output: &Tensor) -> Tensor {
    fake_output.mean(Kind::Float) - real_output.mean(Kind::Float)
}

/// Mean softmax cross-entropy of class logits against integer labels
pub fn classification_loss(logits: &Tensor, labels: &Tensor) -> Tensor {
    logits.cross_entropy_for_logits(labels)
}

/// Number of rows whose arg-max logit equals the label
pub fn correct_predictions(logits: &Tensor, labels: &Tensor) -> i64 {
    logits
        .argmax(-1, false)
        .eq_tensor(labels)
        .sum(Kind::Int64)
        .int64_value(&[])
}

/// Classification accuracy in percent
pub fn accuracy_percent(logits: &Tensor, labels: &Tensor) -> f64 {
    let total = labels.size()[0];
    if total == 0 {
        return 0.0;
    }
    100.0 * correct_predictions(logits, labels) as f64 / total as f64
}
