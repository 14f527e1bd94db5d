//! Generator network for the conditional WGAN-GP
//!
//! The Generator maps a latent code (with the class label one-hot encoded in
//! its first components) to a 3x32x32 image in (-1, 1).

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent code (label prefix included)
    pub latent_dim: i64,
    /// Number of channels in every hidden feature map
    pub channels: i64,
    /// Number of output image channels
    pub image_channels: i64,
    /// Side length of the initial feature map
    pub init_size: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            channels: 196,
            image_channels: 3,
            init_size: 4,
        }
    }
}

/// Upsampling or resolution-preserving convolution of a hidden stage
#[derive(Debug)]
enum StageConv {
    /// Transposed convolution doubling the spatial size
    Up(nn::ConvTranspose2D),
    /// 3x3 convolution keeping the spatial size
    Same(nn::Conv2D),
}

/// Stage layout: three upsampling stages (4 -> 8 -> 16 -> 32) interleaved
/// with stride-1 convolutions
const STAGE_UPSAMPLES: [bool; 7] = [true, false, false, false, true, false, true];

/// One conv -> ReLU -> batch norm stage
#[derive(Debug)]
struct GenStage {
    conv: StageConv,
    norm: nn::BatchNorm,
}

impl GenStage {
    fn new(vs: &nn::Path, channels: i64, upsample: bool) -> Self {
        let conv = if upsample {
            let config = nn::ConvTransposeConfig {
                stride: 2,
                padding: 1,
                ..Default::default()
            };
            StageConv::Up(nn::conv_transpose2d(vs / "conv", channels, channels, 4, config))
        } else {
            let config = nn::ConvConfig {
                stride: 1,
                padding: 1,
                ..Default::default()
            };
            StageConv::Same(nn::conv2d(vs / "conv", channels, channels, 3, config))
        };
        let norm = nn::batch_norm2d(vs / "norm", channels, Default::default());

        Self { conv, norm }
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let x = match &self.conv {
            StageConv::Up(conv) => conv.forward(xs),
            StageConv::Same(conv) => conv.forward(xs),
        };
        self.norm.forward_t(&x.relu(), train)
    }
}

/// Generator network
///
/// Architecture:
/// 1. Linear projection to (channels x 4 x 4) with BatchNorm1d
/// 2. Seven conv stages with ReLU and BatchNorm2d, three of them upsampling
/// 3. Final 3x3 conv to RGB with Tanh activation
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    /// Initial dense projection
    fc: nn::Linear,
    fc_norm: nn::BatchNorm,
    stages: Vec<GenStage>,
    /// Output convolution, no normalization
    to_image: nn::Conv2D,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let projected = config.channels * config.init_size * config.init_size;

        let fc = nn::linear(vs / "fc", config.latent_dim, projected, Default::default());
        let fc_norm = nn::batch_norm1d(vs / "fc_norm", projected, Default::default());

        let stages = STAGE_UPSAMPLES
            .iter()
            .enumerate()
            .map(|(i, &upsample)| {
                GenStage::new(&(vs / format!("stage{}", i + 1)), config.channels, upsample)
            })
            .collect();

        let out_config = nn::ConvConfig {
            stride: 1,
            padding: 1,
            ..Default::default()
        };
        let to_image = nn::conv2d(
            vs / "to_image",
            config.channels,
            config.image_channels,
            3,
            out_config,
        );

        Self {
            config,
            fc,
            fc_norm,
            stages,
            to_image,
        }
    }

    /// Generate images from latent codes
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    /// * `train` - Batch statistics when true, running statistics when false
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 3, 32, 32) with values in (-1, 1)
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let batch_size = noise.size()[0];
        let init = self.config.init_size;

        let x = self.fc_norm.forward_t(&self.fc.forward(noise), train);
        let x = x.view([batch_size, self.config.channels, init, init]);

        let x = self
            .stages
            .iter()
            .fold(x, |x, stage| stage.forward_t(&x, train));

        self.to_image.forward(&x).tanh()
    }

    /// Generate samples (evaluation mode)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        self.forward_t(noise, false)
    }

    /// Side length of generated images
    pub fn output_size(&self) -> i64 {
        let upsamples = STAGE_UPSAMPLES.iter().filter(|&&up| up).count() as u32;
        self.config.init_size * 2i64.pow(upsamples)
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
