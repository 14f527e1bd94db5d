//! Discriminator network for the conditional WGAN-GP
//!
//! The Discriminator is a Wasserstein critic with an auxiliary classifier:
//! every image gets an unbounded realness score and a vector of class logits.
//! Both heads share one convolutional trunk.

use tch::{nn, nn::Module, Tensor};

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Number of channels produced by every convolutional stage
    pub channels: i64,
    /// Number of image classes (width of the classifier head)
    pub num_classes: i64,
    /// Number of input image channels
    pub image_channels: i64,
    /// Input image side length
    pub image_size: i64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            channels: 196,
            num_classes: 10,
            image_channels: 3,
            image_size: 32,
        }
    }
}

/// Strides of the eight stages; three of them halve the resolution (32 -> 4)
const STAGE_STRIDES: [i64; 8] = [1, 2, 1, 2, 1, 1, 1, 2];

/// One conv -> layer norm -> leaky ReLU stage
#[derive(Debug)]
struct ConvStage {
    conv: nn::Conv2D,
    norm: nn::LayerNorm,
}

impl ConvStage {
    fn new(vs: &nn::Path, in_channels: i64, out_channels: i64, stride: i64, out_size: i64) -> Self {
        let conv_config = nn::ConvConfig {
            stride,
            padding: 1,
            ..Default::default()
        };
        let conv = nn::conv2d(vs / "conv", in_channels, out_channels, 3, conv_config);
        // Normalized over channel and spatial extent of each sample
        let norm = nn::layer_norm(
            vs / "norm",
            vec![out_channels, out_size, out_size],
            Default::default(),
        );

        Self { conv, norm }
    }

    fn forward(&self, xs: &Tensor) -> Tensor {
        self.norm.forward(&self.conv.forward(xs)).leaky_relu()
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. Eight 3x3 conv stages with LayerNorm and LeakyReLU
/// 2. Global 4x4 max pool to a feature vector
/// 3. Linear realness head (1 output) and linear class head
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    stages: Vec<ConvStage>,
    /// Realness (critic) head
    critic: nn::Linear,
    /// Auxiliary classifier head
    classifier: nn::Linear,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Self {
        let mut stages = Vec::with_capacity(STAGE_STRIDES.len());
        let mut in_channels = config.image_channels;
        let mut size = config.image_size;

        for (i, &stride) in STAGE_STRIDES.iter().enumerate() {
            size /= stride;
            stages.push(ConvStage::new(
                &(vs / format!("stage{}", i + 1)),
                in_channels,
                config.channels,
                stride,
                size,
            ));
            in_channels = config.channels;
        }

        let critic = nn::linear(vs / "critic", config.channels, 1, Default::default());
        let classifier = nn::linear(
            vs / "classifier",
            config.channels,
            config.num_classes,
            Default::default(),
        );

        Self {
            config,
            stages,
            critic,
            classifier,
        }
    }

    /// Shared trunk: image batch -> pooled feature vector of shape (batch, channels)
    fn features(&self, images: &Tensor) -> Tensor {
        let x = self
            .stages
            .iter()
            .fold(images.shallow_clone(), |x, stage| stage.forward(&x));

        let pool = self.final_size();
        x.max_pool2d([pool, pool], [pool, pool], [0, 0], [1, 1], false)
            .flatten(1, -1)
    }

    /// Forward pass
    ///
    /// Layer normalization does not depend on batch statistics, so `train`
    /// has no numerical effect; it is kept so both networks share one calling
    /// convention.
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch_size, 3, 32, 32)
    /// * `train` - Whether this is a training-time pass
    ///
    /// # Returns
    ///
    /// Tuple of realness scores (batch_size, 1) and class logits (batch_size, num_classes)
    pub fn forward_t(&self, images: &Tensor, _train: bool) -> (Tensor, Tensor) {
        let features = self.features(images);
        (self.critic.forward(&features), self.classifier.forward(&features))
    }

    /// Realness head only
    pub fn critic_t(&self, images: &Tensor, _train: bool) -> Tensor {
        self.critic.forward(&self.features(images))
    }

    /// Spatial side length after the last stage
    pub fn final_size(&self) -> i64 {
        STAGE_STRIDES
            .iter()
            .fold(self.config.image_size, |size, stride| size / stride)
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}
