//! Gradient penalty for the Wasserstein critic
//!
//! Pushes the norm of the critic's input gradient towards 1 on random
//! interpolates between real and generated images.

use tch::{Kind, Tensor};

use crate::error::{Error, Result};
use crate::model::Discriminator;

/// Default penalty coefficient
pub const DEFAULT_LAMBDA: f64 = 10.0;

/// Compute `lambda * mean((||grad_x D(x_hat)||_2 - 1)^2)`
///
/// `x_hat = alpha * real + (1 - alpha) * fake` with one `alpha ~ U[0, 1]` per
/// sample. Real and fake are detached before blending; the input gradient is
/// built with `create_graph`, so the returned penalty can be differentiated
/// again with respect to the discriminator parameters.
///
/// # Arguments
///
/// * `discriminator` - Critic whose input gradient is penalized
/// * `real` - Real images (batch_size, C, H, W)
/// * `fake` - Generated images, same shape as `real`
/// * `lambda` - Penalty coefficient
pub fn gradient_penalty(
    discriminator: &Discriminator,
    real: &Tensor,
    fake: &Tensor,
    lambda: f64,
) -> Result<Tensor> {
    let shape = real.size();
    if shape != fake.size() {
        return Err(Error::shape(&shape, &fake.size()));
    }
    if shape.is_empty() || shape[0] == 0 {
        return Err(Error::DataShapeError {
            expected: vec![1],
            actual: shape,
        });
    }

    let batch_size = shape[0];
    let mut alpha_shape = vec![batch_size];
    alpha_shape.resize(shape.len(), 1);
    let alpha = Tensor::rand(alpha_shape.as_slice(), (Kind::Float, real.device()));

    let (real, fake) = (real.detach(), fake.detach());
    let interpolates = (&fake + alpha * (&real - &fake)).set_requires_grad(true);

    let scores = discriminator.critic_t(&interpolates, true);
    let gradients = Tensor::run_backward(&[scores.sum(Kind::Float)], &[&interpolates], true, true);

    let norms = gradients[0]
        .reshape([batch_size, -1])
        .linalg_norm(2.0, [1].as_slice(), false, Kind::Float);

    Ok((norms - 1.0).square().mean(Kind::Float) * lambda)
}
