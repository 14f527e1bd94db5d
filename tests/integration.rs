//! End-to-end training scenarios on synthetic data

use std::path::Path;

use tch::{Device, Kind, Tensor};

use acwgan_gp::data::{DataLoader, ImageDataset};
use acwgan_gp::model::{fixed_noise, ConditionalWgan, NoiseSampler};
use acwgan_gp::training::{evaluate_accuracy, Trainer, TrainingConfig, TrainingMetrics};
use acwgan_gp::utils::{CheckpointPaths, Config, RunLog};

const WIDTH: i64 = 8;

fn narrow_gan() -> ConditionalWgan {
    ConditionalWgan::with_defaults(100, 10, WIDTH, Device::Cpu)
}

fn config_in(dir: &Path, batch_size: i64, epochs: usize) -> TrainingConfig {
    TrainingConfig {
        epochs,
        batch_size,
        checkpoints: CheckpointPaths::in_dir(dir),
        sample_dir: dir.join("output"),
        metrics_path: dir.join("training_metrics.csv"),
        show_progress: false,
        ..Default::default()
    }
}

fn synthetic_loaders(train: i64, test: i64, batch_size: usize) -> (DataLoader, DataLoader) {
    let train = ImageDataset::synthetic(train, 10, 7).unwrap();
    let test = ImageDataset::synthetic(test, 10, 8).unwrap();
    (
        DataLoader::new(train, batch_size, true, false, 0).with_prefetch(2),
        DataLoader::new(test, batch_size, false, false, 0),
    )
}

#[test]
fn test_one_epoch_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("discriminator_generator_training.log");
    let (mut train, mut test) = synthetic_loaders(256, 50, 128);
    let mut gan = narrow_gan();

    let summary = {
        let log = RunLog::open(&log_path, false).unwrap();
        let mut trainer = Trainer::new(config_in(dir.path(), 128, 1), Device::Cpu);
        trainer.train(&mut gan, &mut train, &mut test, &log).unwrap()
    };

    assert_eq!(summary.epochs_completed, 1);
    assert_eq!(summary.generator_updates, 2);
    assert_eq!(summary.discriminator_updates, 2);
    assert_eq!(summary.skipped_batches, 0);

    let paths = CheckpointPaths::in_dir(dir.path());
    assert!(paths.generator.exists());
    assert!(paths.discriminator.exists());
    assert!(dir.path().join("output/000.png").exists());
    assert!(!dir.path().join("output/001.png").exists());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("Testing accuracy").count(), 1);
    assert!(log.contains("2 generator updates, 2 discriminator updates"));

    let metrics = TrainingMetrics::load_csv(&dir.path().join("training_metrics.csv")).unwrap();
    assert_eq!(metrics.num_epochs(), 1);
    assert_eq!(metrics.latest_test_accuracy(), Some(summary.final_test_accuracy));
}

#[test]
fn test_checkpoint_restores_trained_networks() {
    let dir = tempfile::tempdir().unwrap();
    let (mut train, mut test) = synthetic_loaders(64, 20, 32);
    let mut gan = narrow_gan();

    {
        let log = RunLog::open(&dir.path().join("run.log"), false).unwrap();
        Trainer::new(config_in(dir.path(), 32, 1), Device::Cpu)
            .train(&mut gan, &mut train, &mut test, &log)
            .unwrap();
    }

    let mut restored = narrow_gan();
    let paths = CheckpointPaths::in_dir(dir.path());
    restored.load(&paths.generator, &paths.discriminator).unwrap();

    let (codes, _) = fixed_noise(100, 10, 1, 352, Device::Cpu).unwrap();
    assert!(gan.generate(&codes).allclose(&restored.generate(&codes), 1e-6, 1e-6, false));

    let trained = evaluate_accuracy(&gan.discriminator, &mut test, Device::Cpu).unwrap();
    let reloaded = evaluate_accuracy(&restored.discriminator, &mut test, Device::Cpu).unwrap();
    assert_eq!(trained, reloaded);
}

#[test]
fn test_sampled_codes_drive_generator() {
    let gan = narrow_gan();
    let mut sampler = NoiseSampler::new(100, 10, 3).unwrap();

    let (codes, labels) = sampler.sample(16, Device::Cpu);
    let images = gan.generate(&codes);

    assert_eq!(images.size(), vec![16, 3, 32, 32]);
    assert!(images.abs().max().double_value(&[]) < 1.0);

    let one_hot = codes.narrow(1, 0, 10).argmax(1, false);
    assert!(one_hot.equal(&labels));
    let row_sums = codes.narrow(1, 0, 10).sum_dim_intlist([1].as_slice(), false, Kind::Float);
    assert!(row_sums.allclose(&Tensor::ones([16], (Kind::Float, Device::Cpu)), 0.0, 0.0, false));
}

#[test]
fn test_default_config_matches_training_defaults() {
    let config = Config::default();
    let training = config.training_config();
    let defaults = TrainingConfig::default();

    assert_eq!(training.epochs, defaults.epochs);
    assert_eq!(training.batch_size, defaults.batch_size);
    assert_eq!(training.gp_lambda, defaults.gp_lambda);
    assert_eq!(training.step_clamp_threshold, defaults.step_clamp_threshold);
    assert_eq!(training.step_clamp_value, defaults.step_clamp_value);
    assert_eq!(training.fixed_noise_seed, defaults.fixed_noise_seed);
    assert_eq!(training.adam.beta2, 0.9);
}
