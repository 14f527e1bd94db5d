//! Configuration management
//!
//! Provides unified configuration for the entire training pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::Device;

use crate::error::{Error, Result};
use crate::model::ConditionalWgan;
use crate::training::{AdamConfig, TrainingConfig};
use crate::utils::CheckpointPaths;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
    /// Output locations
    pub output: OutputConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the CIFAR-10 binary batches
    pub dataset_dir: String,
    /// Use a synthetic dataset of this many training images instead (0 = off)
    pub synthetic_samples: usize,
    /// Batch size
    pub batch_size: usize,
    /// Batches prepared ahead of the training loop (0 = inline)
    pub prefetch: usize,
    /// Augment training images
    pub augment: bool,
    /// Seed for shuffling and augmentation
    pub seed: u64,
}

/// Model-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent dimension size (includes the one-hot prefix)
    pub latent_dim: i64,
    /// Number of image classes
    pub num_classes: i64,
    /// Hidden channel width of both networks
    pub channels: i64,
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfigFile {
    /// Number of epochs
    pub epochs: usize,
    /// Learning rate of both optimizers
    pub learning_rate: f64,
    /// Adam beta1
    pub beta1: f64,
    /// Adam beta2
    pub beta2: f64,
    /// Gradient penalty coefficient
    pub gp_lambda: f64,
    /// Run a generator update every N batches
    pub gen_train_every: usize,
    /// Adam step counters at or above this value are reset each epoch
    pub step_clamp_threshold: u64,
    /// Value the step counters are reset to
    pub step_clamp_value: u64,
    /// Emit a progress summary every N batches
    pub log_every: usize,
    /// Seed of the torch RNG and the noise sampler
    pub seed: u64,
    /// Seed of the visualization noise
    pub fixed_noise_seed: u64,
    /// Device: "cpu", "cuda" or "auto"
    pub device: String,
    /// Show a progress bar per epoch
    pub show_progress: bool,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for network snapshots and the metrics CSV
    pub checkpoint_dir: String,
    /// Generator snapshot file name
    pub generator_file: String,
    /// Discriminator snapshot file name
    pub discriminator_file: String,
    /// Directory for per-epoch sample grids
    pub sample_dir: String,
    /// Run log file
    pub log_file: String,
    /// Per-epoch metrics file name (inside `checkpoint_dir`)
    pub metrics_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                dataset_dir: "data/cifar-10-batches-bin".to_string(),
                synthetic_samples: 0,
                batch_size: 128,
                prefetch: 2,
                augment: true,
                seed: 0,
            },
            model: ModelConfig {
                latent_dim: 100,
                num_classes: 10,
                channels: 196,
            },
            training: TrainingConfigFile {
                epochs: 220,
                learning_rate: 1e-4,
                beta1: 0.0,
                beta2: 0.9,
                gp_lambda: 10.0,
                gen_train_every: 1,
                step_clamp_threshold: 1024,
                step_clamp_value: 1000,
                log_every: 50,
                seed: 0,
                fixed_noise_seed: crate::model::FIXED_NOISE_SEED,
                device: "auto".to_string(),
                show_progress: true,
            },
            output: OutputConfig {
                checkpoint_dir: ".".to_string(),
                generator_file: "generator.ot".to_string(),
                discriminator_file: "discriminator.ot".to_string(),
                sample_dir: "output".to_string(),
                log_file: "discriminator_generator_training.log".to_string(),
                metrics_file: "training_metrics.csv".to_string(),
            },
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `.toml` or `.json`, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Resolve the configured device
    ///
    /// Explicitly requesting CUDA on a machine without it is an error,
    /// `auto` falls back to the CPU.
    pub fn resolve_device(&self) -> Result<Device> {
        match self.training.device.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    Ok(Device::Cuda(0))
                } else {
                    Err(Error::DeviceError("CUDA requested but not available".into()))
                }
            }
            "auto" => Ok(Device::cuda_if_available()),
            other => Err(Error::ConfigError(format!("unknown device '{}'", other))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::ConfigError(msg.to_string()));
        let t = &self.training;

        // Train-mode batch norm needs more than one value per channel
        if self.data.batch_size < 2 {
            return fail("Batch size must be at least 2");
        }
        if self.model.num_classes <= 0 {
            return fail("Number of classes must be > 0");
        }
        if self.model.latent_dim <= self.model.num_classes {
            return fail("Latent dimension must exceed the number of classes");
        }
        if self.model.channels <= 0 {
            return fail("Channel width must be > 0");
        }
        if t.epochs == 0 {
            return fail("Number of epochs must be > 0");
        }
        if t.learning_rate <= 0.0 {
            return fail("Learning rate must be > 0");
        }
        if !(0.0..1.0).contains(&t.beta1) || !(0.0..1.0).contains(&t.beta2) {
            return fail("Adam betas must lie in [0, 1)");
        }
        if t.gp_lambda < 0.0 {
            return fail("Gradient penalty coefficient must be >= 0");
        }
        if t.gen_train_every == 0 {
            return fail("Generator update cadence must be > 0");
        }
        if t.step_clamp_value >= t.step_clamp_threshold {
            return fail("Step clamp value must be below the clamp threshold");
        }
        if t.log_every == 0 {
            return fail("Logging interval must be > 0");
        }
        Ok(())
    }

    /// Seed the torch RNG from `training.seed` and build both networks
    pub fn build_model(&self, device: Device) -> ConditionalWgan {
        tch::manual_seed(self.training.seed as i64);
        ConditionalWgan::with_defaults(
            self.model.latent_dim,
            self.model.num_classes,
            self.model.channels,
            device,
        )
    }

    /// Paths of the two network snapshots
    pub fn checkpoint_paths(&self) -> CheckpointPaths {
        let dir = Path::new(&self.output.checkpoint_dir);
        CheckpointPaths::new(
            dir.join(&self.output.generator_file),
            dir.join(&self.output.discriminator_file),
        )
    }

    /// Path of the run log
    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.output.log_file)
    }

    /// Build the trainer configuration
    pub fn training_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            epochs: t.epochs,
            batch_size: self.data.batch_size as i64,
            adam: AdamConfig {
                lr: t.learning_rate,
                beta1: t.beta1,
                beta2: t.beta2,
                ..Default::default()
            },
            gp_lambda: t.gp_lambda,
            gen_train_every: t.gen_train_every,
            step_clamp_threshold: t.step_clamp_threshold,
            step_clamp_value: t.step_clamp_value,
            log_every: t.log_every,
            seed: t.seed,
            fixed_noise_seed: t.fixed_noise_seed,
            checkpoints: self.checkpoint_paths(),
            sample_dir: PathBuf::from(&self.output.sample_dir),
            metrics_path: Path::new(&self.output.checkpoint_dir).join(&self.output.metrics_file),
            show_progress: t.show_progress,
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|e| e == "toml").unwrap_or(false)
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::from_file(path)
    } else {
        let config = Config::default();
        if is_toml(path) {
            config.save_toml(path)?;
        } else {
            config.save_json(path)?;
        }
        Ok(config)
    }
}
