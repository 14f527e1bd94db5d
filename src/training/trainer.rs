//! Training loop implementation for the conditional WGAN-GP
//!
//! Each batch runs an optional generator update followed by one
//! discriminator update. Every update requests gradients only for the
//! parameters of the network being trained, so the other network is never
//! touched.

use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::{Device, Tensor};
use tracing::{debug, info};

use super::losses::{
    accuracy_percent, classification_loss, correct_predictions, discriminator_loss_wasserstein,
    generator_loss_wasserstein,
};
use super::metrics::{BatchStats, EpochRecord, RunningMetrics, TrainingMetrics};
use super::optim::{Adam, AdamConfig};
use super::penalty::gradient_penalty;
use crate::data::{Batch, DataLoader};
use crate::error::Result;
use crate::model::{fixed_noise, ConditionalWgan, Discriminator, NoiseSampler};
use crate::utils::{save_checkpoint, save_sample_grid, CheckpointPaths, RunLog};

/// Fixed-noise samples drawn per class for the progress grid
const SAMPLES_PER_CLASS: i64 = 10;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Expected batch size; smaller batches are skipped
    pub batch_size: i64,
    /// Optimizer hyperparameters (shared by both networks)
    pub adam: AdamConfig,
    /// Gradient penalty coefficient
    pub gp_lambda: f64,
    /// Run a generator update every N batches
    pub gen_train_every: usize,
    /// Step counters at or above this value are reset at every epoch start
    pub step_clamp_threshold: u64,
    /// Value the step counters are reset to
    pub step_clamp_value: u64,
    /// Emit a progress summary every N batches
    pub log_every: usize,
    /// Seed of the torch RNG and the noise sampler
    pub seed: u64,
    /// Seed of the visualization noise
    pub fixed_noise_seed: u64,
    /// Network snapshot locations
    pub checkpoints: CheckpointPaths,
    /// Directory for per-epoch sample grids
    pub sample_dir: PathBuf,
    /// Per-epoch metrics CSV
    pub metrics_path: PathBuf,
    /// Show a progress bar per epoch
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 220,
            batch_size: 128,
            adam: AdamConfig::default(),
            gp_lambda: super::penalty::DEFAULT_LAMBDA,
            gen_train_every: 1,
            step_clamp_threshold: 1024,
            step_clamp_value: 1000,
            log_every: 50,
            seed: 0,
            fixed_noise_seed: crate::model::FIXED_NOISE_SEED,
            checkpoints: CheckpointPaths::in_dir(std::path::Path::new(".")),
            sample_dir: PathBuf::from("output"),
            metrics_path: PathBuf::from("training_metrics.csv"),
            show_progress: true,
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    /// Epochs run to completion
    pub epochs_completed: usize,
    /// Generator optimizer steps
    pub generator_updates: usize,
    /// Discriminator optimizer steps
    pub discriminator_updates: usize,
    /// Undersized batches skipped
    pub skipped_batches: usize,
    /// Held-out accuracy after the last epoch, in percent
    pub final_test_accuracy: f64,
}

/// Conditional WGAN-GP trainer
pub struct Trainer {
    config: TrainingConfig,
    device: Device,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainingConfig, device: Device) -> Self {
        Self {
            config,
            device,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Train both networks
    ///
    /// # Arguments
    ///
    /// * `gan` - Networks to train, updated in place
    /// * `train_loader` - Shuffled training batches
    /// * `test_loader` - Held-out batches for the per-epoch accuracy
    /// * `log` - Logging context of this run
    pub fn train(
        &mut self,
        gan: &mut ConditionalWgan,
        train_loader: &mut DataLoader,
        test_loader: &mut DataLoader,
        log: &RunLog,
    ) -> Result<TrainingSummary> {
        let config = self.config.clone();
        tch::manual_seed(config.seed as i64);

        let mut gen_opt = Adam::new(gan.generator_parameters(), config.adam);
        let mut disc_opt = Adam::new(gan.discriminator_parameters(), config.adam);
        let mut sampler = NoiseSampler::new(gan.latent_dim(), gan.num_classes(), config.seed)?;
        let (fixed_codes, _) = fixed_noise(
            gan.latent_dim(),
            gan.num_classes(),
            SAMPLES_PER_CLASS,
            config.fixed_noise_seed,
            self.device,
        )?;

        let num_batches = train_loader.num_batches();
        info!(
            "Starting training for {} epochs, {} batches per epoch",
            config.epochs, num_batches
        );

        let start = Instant::now();
        let mut summary = TrainingSummary::default();

        for epoch in 0..config.epochs {
            let clamped = gen_opt.clamp_step_counts(config.step_clamp_threshold, config.step_clamp_value)
                + disc_opt.clamp_step_counts(config.step_clamp_threshold, config.step_clamp_value);
            if clamped > 0 {
                debug!("Reset {} Adam step counters to {}", clamped, config.step_clamp_value);
            }

            let pb = progress_bar(num_batches as u64, config.show_progress);
            let mut running = RunningMetrics::new();
            let mut epoch_gen_updates = 0;

            for (batch_idx, batch) in train_loader.iter().enumerate() {
                pb.inc(1);

                if let Err(err) = batch.check_shape(config.batch_size) {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    debug!("Skipping batch {}: {}", batch_idx, err);
                    summary.skipped_batches += 1;
                    continue;
                }
                let batch = batch.to_device(self.device);

                if batch_idx % config.gen_train_every == 0 {
                    self.generator_step(gan, &mut sampler, &mut gen_opt)?;
                    epoch_gen_updates += 1;
                }

                let stats = self.discriminator_step(gan, &batch, &mut sampler, &mut disc_opt)?;
                running.record(&stats);
                summary.discriminator_updates += 1;

                pb.set_message(format!("acc {:.2}", stats.accuracy));

                if batch_idx % config.log_every == 0 {
                    let m = running.means();
                    pb.suspend(|| {
                        log.summary(&format!(
                            "Epoch {} batch {}: gp {:.2} fake {:.2} real {:.2} real class {:.2} fake class {:.2} acc {:.2}",
                            epoch,
                            batch_idx,
                            m.gradient_penalty,
                            m.fake_score,
                            m.real_score,
                            m.real_class_loss,
                            m.fake_class_loss,
                            m.accuracy
                        ))
                    });
                }
            }
            pb.finish_and_clear();
            summary.generator_updates += epoch_gen_updates;

            let test_accuracy = evaluate_accuracy(&gan.discriminator, test_loader, self.device)?;
            let elapsed = start.elapsed().as_secs_f64();
            log.summary(&format!(
                "Testing accuracy - {:.2}, Time taken - {:.1}s",
                test_accuracy, elapsed
            ));
            info!(
                "Epoch {}/{}: {} generator updates, {} discriminator updates",
                epoch + 1,
                config.epochs,
                epoch_gen_updates,
                running.len()
            );

            let samples = gan.generate(&fixed_codes);
            let grid_path = config.sample_dir.join(format!("{:03}.png", epoch));
            save_sample_grid(&samples, &grid_path, gan.num_classes())?;

            save_checkpoint(gan, &config.checkpoints)?;

            self.metrics.record_epoch(EpochRecord {
                epoch,
                means: running.means(),
                test_accuracy,
                elapsed_secs: elapsed,
            });
            self.metrics.save_csv(&config.metrics_path)?;

            summary.epochs_completed = epoch + 1;
            summary.final_test_accuracy = test_accuracy;
        }

        save_checkpoint(gan, &config.checkpoints)?;
        info!(
            "Training finished: {} epochs, {} skipped batches",
            summary.epochs_completed, summary.skipped_batches
        );

        Ok(summary)
    }

    /// One generator update on a fresh conditional noise batch
    ///
    /// # Returns
    ///
    /// Generator cost
    fn generator_step(
        &self,
        gan: &ConditionalWgan,
        sampler: &mut NoiseSampler,
        opt: &mut Adam,
    ) -> Result<f64> {
        let (codes, labels) = sampler.sample(self.config.batch_size, self.device);

        let fake = gan.generator.forward_t(&codes, true);
        let (scores, logits) = gan.discriminator.forward_t(&fake, true);
        let cost = generator_loss_wasserstein(&scores) + classification_loss(&logits, &labels);

        let grads = Tensor::run_backward(&[&cost], opt.params(), false, false);
        opt.step(&grads)?;

        Ok(cost.double_value(&[]))
    }

    /// One discriminator update against a real batch and fresh fakes
    fn discriminator_step(
        &self,
        gan: &ConditionalWgan,
        batch: &Batch,
        sampler: &mut NoiseSampler,
        opt: &mut Adam,
    ) -> Result<BatchStats> {
        let (codes, fake_labels) = sampler.sample(self.config.batch_size, self.device);
        let fake = tch::no_grad(|| gan.generator.forward_t(&codes, true));

        let (fake_scores, fake_logits) = gan.discriminator.forward_t(&fake, true);
        let (real_scores, real_logits) = gan.discriminator.forward_t(&batch.images, true);

        let fake_class = classification_loss(&fake_logits, &fake_labels);
        let real_class = classification_loss(&real_logits, &batch.labels);
        let penalty = gradient_penalty(
            &gan.discriminator,
            &batch.images,
            &fake,
            self.config.gp_lambda,
        )?;

        let cost = discriminator_loss_wasserstein(&real_scores, &fake_scores)
            + &real_class
            + &fake_class
            + &penalty;

        let grads = Tensor::run_backward(&[&cost], opt.params(), false, false);
        opt.step(&grads)?;

        Ok(BatchStats {
            gradient_penalty: penalty.double_value(&[]),
            fake_score: fake_scores.mean(tch::Kind::Float).double_value(&[]),
            real_score: real_scores.mean(tch::Kind::Float).double_value(&[]),
            real_class_loss: real_class.double_value(&[]),
            fake_class_loss: fake_class.double_value(&[]),
            accuracy: accuracy_percent(&real_logits, &batch.labels),
        })
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }
}

/// Classification accuracy of the discriminator over every test batch
///
/// Runs in evaluation mode without gradient tracking and weighs each batch
/// by its true size.
///
/// # Returns
///
/// Accuracy in percent (0 for an empty loader)
pub fn evaluate_accuracy(
    discriminator: &Discriminator,
    loader: &mut DataLoader,
    device: Device,
) -> Result<f64> {
    let mut correct = 0i64;
    let mut total = 0i64;

    tch::no_grad(|| {
        for batch in loader.iter() {
            let batch = batch.to_device(device);
            let (_, logits) = discriminator.forward_t(&batch.images, false);
            correct += correct_predictions(&logits, &batch.labels);
            total += batch.len();
        }
    });

    if total == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * correct as f64 / total as f64)
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ImageDataset;

    fn narrow_gan() -> ConditionalWgan {
        ConditionalWgan::with_defaults(100, 10, 8, Device::Cpu)
    }

    fn config_in(dir: &std::path::Path, batch_size: i64) -> TrainingConfig {
        TrainingConfig {
            epochs: 1,
            batch_size,
            checkpoints: CheckpointPaths::in_dir(dir),
            sample_dir: dir.join("output"),
            metrics_path: dir.join("training_metrics.csv"),
            show_progress: false,
            ..Default::default()
        }
    }

    fn loaders(n: i64, batch_size: usize) -> (DataLoader, DataLoader) {
        let train = DataLoader::new(ImageDataset::synthetic(n, 10, 1).unwrap(), batch_size, true, false, 0);
        let test = DataLoader::new(ImageDataset::synthetic(30, 10, 2).unwrap(), 16, false, false, 0);
        (train, test)
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 220);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.gen_train_every, 1);
        assert_eq!(config.gp_lambda, 10.0);
    }

    #[test]
    fn test_undersized_batch_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("run.log"), false).unwrap();
        let (mut train, mut test) = loaders(256, 100);
        let mut gan = narrow_gan();

        let mut trainer = Trainer::new(config_in(dir.path(), 100), Device::Cpu);
        let summary = trainer.train(&mut gan, &mut train, &mut test, &log).unwrap();

        assert_eq!(summary.generator_updates, 2);
        assert_eq!(summary.discriminator_updates, 2);
        assert_eq!(summary.skipped_batches, 1);
        assert_eq!(trainer.metrics().num_epochs(), 1);
    }

    #[test]
    fn test_periodic_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        // Five full batches of 5 and a trailing batch of 2
        let (mut train, mut test) = loaders(27, 5);
        let mut gan = narrow_gan();

        let config = TrainingConfig {
            log_every: 2,
            ..config_in(dir.path(), 5)
        };
        let mut trainer = Trainer::new(config, Device::Cpu);
        let summary = {
            let log = RunLog::open(&log_path, false).unwrap();
            trainer.train(&mut gan, &mut train, &mut test, &log).unwrap()
        };
        assert_eq!(summary.discriminator_updates, 5);
        assert_eq!(summary.skipped_batches, 1);

        let text = std::fs::read_to_string(&log_path).unwrap();
        for idx in [0, 2, 4] {
            assert_eq!(text.matches(&format!("Epoch 0 batch {}:", idx)).count(), 1);
        }
        for idx in [1, 3, 5] {
            assert!(!text.contains(&format!("Epoch 0 batch {}:", idx)));
        }

        // The last summary covers every recorded batch and nothing from the skipped one
        let means = &trainer.metrics().epochs()[0].means;
        let last = text
            .lines()
            .find(|line| line.contains("Epoch 0 batch 4:"))
            .unwrap();
        assert!(last.contains(&format!("gp {:.2}", means.gradient_penalty)));
        assert!(last.contains(&format!("real class {:.2}", means.real_class_loss)));
        assert!(last.contains(&format!("acc {:.2}", means.accuracy)));
    }

    #[test]
    fn test_generator_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(&dir.path().join("run.log"), false).unwrap();
        let (mut train, mut test) = loaders(40, 10);
        let mut gan = narrow_gan();

        let config = TrainingConfig {
            gen_train_every: 3,
            ..config_in(dir.path(), 10)
        };
        let summary = Trainer::new(config, Device::Cpu)
            .train(&mut gan, &mut train, &mut test, &log)
            .unwrap();

        // Batches 0 and 3 of 0..4
        assert_eq!(summary.generator_updates, 2);
        assert_eq!(summary.discriminator_updates, 4);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let gan = narrow_gan();
        let (_, mut test) = loaders(10, 10);

        let first = evaluate_accuracy(&gan.discriminator, &mut test, Device::Cpu).unwrap();
        let second = evaluate_accuracy(&gan.discriminator, &mut test, Device::Cpu).unwrap();

        assert_eq!(first, second);
        assert!((0.0..=100.0).contains(&first));
    }

    #[test]
    fn test_generator_step_leaves_discriminator_untouched() {
        let gan = narrow_gan();
        let trainer = Trainer::new(config_in(std::path::Path::new("."), 4), Device::Cpu);
        let mut sampler = NoiseSampler::new(100, 10, 0).unwrap();
        let mut gen_opt = Adam::new(gan.generator_parameters(), AdamConfig::default());

        let disc_before: Vec<Tensor> = gan
            .discriminator_parameters()
            .iter()
            .map(|p| p.detach().copy())
            .collect();
        let gen_before: Vec<Tensor> = gan
            .generator_parameters()
            .iter()
            .map(|p| p.detach().copy())
            .collect();

        trainer.generator_step(&gan, &mut sampler, &mut gen_opt).unwrap();

        for (before, after) in disc_before.iter().zip(gan.discriminator_parameters()) {
            assert!(before.equal(&after.detach()));
        }
        let changed = gen_before
            .iter()
            .zip(gan.generator_parameters())
            .any(|(before, after)| !before.equal(&after.detach()));
        assert!(changed);
    }

    #[test]
    fn test_discriminator_step_reports_statistics() {
        let gan = narrow_gan();
        let trainer = Trainer::new(config_in(std::path::Path::new("."), 8), Device::Cpu);
        let mut sampler = NoiseSampler::new(100, 10, 0).unwrap();
        let mut disc_opt = Adam::new(gan.discriminator_parameters(), AdamConfig::default());

        let dataset = ImageDataset::synthetic(8, 10, 4).unwrap();
        let batch = Batch {
            images: dataset.images().shallow_clone(),
            labels: dataset.labels().shallow_clone(),
        };

        let stats = trainer
            .discriminator_step(&gan, &batch, &mut sampler, &mut disc_opt)
            .unwrap();

        assert!(stats.gradient_penalty >= 0.0);
        assert!(stats.real_class_loss > 0.0);
        assert!((0.0..=100.0).contains(&stats.accuracy));
        assert!(disc_opt.step_counts().iter().all(|s| *s == Some(1)));
    }
}
