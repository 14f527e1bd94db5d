//! Training-time image augmentation
//!
//! Random resized crop, horizontal flip and colour jitter (brightness,
//! contrast, saturation), applied independently to every image of a batch.
//! Hue is left untouched.

use rand::rngs::StdRng;
use rand::Rng;
use tch::{Kind, Tensor};

/// Augmentation parameters
#[derive(Debug, Clone, Copy)]
pub struct Augmentation {
    /// Smallest fraction of the image area kept by the crop
    pub min_crop_area: f64,
    /// Probability of a horizontal flip
    pub flip_prob: f64,
    /// Brightness, contrast and saturation factors are drawn from [1 - jitter, 1 + jitter]
    pub jitter: f64,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            min_crop_area: 0.7,
            flip_prob: 0.5,
            jitter: 0.1,
        }
    }
}

impl Augmentation {
    /// Augment a batch of images in [-1, 1]
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch_size, C, H, W) with H == W
    /// * `rng` - Random source for all augmentation decisions
    pub fn apply(&self, images: &Tensor, rng: &mut StdRng) -> Tensor {
        let batch_size = images.size()[0];
        if batch_size == 0 {
            return images.shallow_clone();
        }

        let augmented: Vec<Tensor> = (0..batch_size)
            .map(|i| self.augment_one(&images.get(i), rng))
            .collect();
        Tensor::stack(&augmented, 0)
    }

    fn augment_one(&self, image: &Tensor, rng: &mut StdRng) -> Tensor {
        let size = image.size()[2];

        // Square crop covering a random share of the area, resized back
        let area = rng.gen_range(self.min_crop_area.min(1.0)..=1.0);
        let side = ((size as f64 * area.sqrt()).round() as i64).clamp(1, size);
        let top = rng.gen_range(0..=size - side);
        let left = rng.gen_range(0..=size - side);

        let mut x = image.narrow(1, top, side).narrow(2, left, side);
        if side != size {
            x = x
                .unsqueeze(0)
                .upsample_bilinear2d([size, size], false, None::<f64>, None::<f64>)
                .squeeze_dim(0);
        }

        if rng.gen_bool(self.flip_prob.clamp(0.0, 1.0)) {
            x = x.flip([2]);
        }

        if self.jitter > 0.0 {
            let brightness = rng.gen_range(1.0 - self.jitter..=1.0 + self.jitter);
            let contrast = rng.gen_range(1.0 - self.jitter..=1.0 + self.jitter);
            let saturation = rng.gen_range(1.0 - self.jitter..=1.0 + self.jitter);

            let pixels = (x + 1.0) * (0.5 * brightness);
            let mean = pixels.mean(Kind::Float);
            let mut pixels = (pixels - &mean) * contrast + mean;
            if pixels.size()[0] == 3 {
                pixels = adjust_saturation(&pixels, saturation);
            }
            x = pixels.clamp(0.0, 1.0) * 2.0 - 1.0;
        }

        x
    }
}

/// Blend an RGB image in [0, 1] with its grayscale version
fn adjust_saturation(rgb: &Tensor, factor: f64) -> Tensor {
    let gray = luminance(rgb);
    &gray + (rgb - &gray) * factor
}

/// ITU-R 601 luma of an RGB image, shape (1, H, W)
fn luminance(rgb: &Tensor) -> Tensor {
    rgb.narrow(0, 0, 1) * 0.299 + rgb.narrow(0, 1, 1) * 0.587 + rgb.narrow(0, 2, 1) * 0.114
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tch::Device;

    #[test]
    fn test_shape_and_range_preserved() {
        let images = Tensor::rand([6, 3, 32, 32], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let mut rng = StdRng::seed_from_u64(5);

        let out = Augmentation::default().apply(&images, &mut rng);

        assert_eq!(out.size(), vec![6, 3, 32, 32]);
        assert!(out.min().double_value(&[]) >= -1.0);
        assert!(out.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_identity_configuration() {
        let images = Tensor::rand([3, 3, 32, 32], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let identity = Augmentation {
            min_crop_area: 1.0,
            flip_prob: 0.0,
            jitter: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(5);

        let out = identity.apply(&images, &mut rng);
        assert!(out.equal(&images));
    }

    #[test]
    fn test_forced_flip_mirrors_width() {
        let images = Tensor::rand([2, 3, 32, 32], (Kind::Float, Device::Cpu));
        let flip_only = Augmentation {
            min_crop_area: 1.0,
            flip_prob: 1.0,
            jitter: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(9);

        let out = flip_only.apply(&images, &mut rng);
        assert!(out.equal(&images.flip([3])));
    }

    #[test]
    fn test_saturation_jitter_keeps_gray_pixels_gray() {
        let gray = Tensor::rand([4, 1, 32, 32], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let images = gray.repeat([1, 3, 1, 1]);
        let color_only = Augmentation {
            min_crop_area: 1.0,
            flip_prob: 0.0,
            jitter: 0.4,
        };
        let mut rng = StdRng::seed_from_u64(3);

        let out = color_only.apply(&images, &mut rng);
        let red = out.narrow(1, 0, 1);
        assert!(out.narrow(1, 1, 1).allclose(&red, 1e-5, 1e-5, false));
        assert!(out.narrow(1, 2, 1).allclose(&red, 1e-5, 1e-5, false));
    }

    #[test]
    fn test_adjust_saturation() {
        let rgb = Tensor::rand([3, 8, 8], (Kind::Float, Device::Cpu));

        assert!(adjust_saturation(&rgb, 1.0).allclose(&rgb, 1e-6, 1e-6, false));

        let desaturated = adjust_saturation(&rgb, 0.0);
        let red = desaturated.narrow(0, 0, 1);
        assert!(desaturated.narrow(0, 1, 1).allclose(&red, 1e-6, 1e-6, false));
        assert!(desaturated.narrow(0, 2, 1).allclose(&red, 1e-6, 1e-6, false));

        // Luma is invariant, chroma scales with the factor
        let boosted = adjust_saturation(&rgb, 1.5);
        assert!(luminance(&boosted).allclose(&luminance(&rgb), 1e-5, 1e-5, false));
        let chroma = &rgb - luminance(&rgb);
        assert!((&boosted - luminance(&boosted)).allclose(&(chroma * 1.5), 1e-5, 1e-5, false));
    }
}
