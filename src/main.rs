//! Conditional WGAN-GP trainer
//!
//! Main entry point providing CLI interface for:
//! - Training the generator/discriminator pair
//! - Writing a default configuration
//! - Rendering conditional sample grids from a checkpoint
//! - Evaluating the discriminator's classifier head

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use acwgan_gp::{
    data::{load_cifar10, Augmentation, DataLoader, ImageDataset},
    model::fixed_noise,
    training::{evaluate_accuracy, Trainer},
    utils::{ensure_config_exists, save_sample_grid, setup_logging, Config, RunLog},
};

/// Auxiliary-classifier conditional WGAN-GP on 32x32 images
#[derive(Parser)]
#[command(name = "acwgan-gp")]
#[command(version = "0.1.0")]
#[command(about = "Train a class-conditional image generator with a gradient-penalized critic")]
struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both networks
    Train {
        /// Override the number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Train on a synthetic dataset of N images instead of CIFAR-10
        #[arg(long)]
        synthetic: Option<usize>,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },

    /// Render a conditional sample grid from the generator checkpoint
    Generate {
        /// Output image path
        #[arg(short, long, default_value = "grid.png")]
        output: PathBuf,

        /// Noise seed (defaults to the fixed visualization seed)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Samples per class
        #[arg(long, default_value = "10")]
        per_class: i64,
    },

    /// Report the discriminator's test accuracy from its checkpoint
    Evaluate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity);

    match cli.command {
        Commands::Train { epochs, synthetic } => train(&cli.config, epochs, synthetic),
        Commands::Init { output } => init_config(&output),
        Commands::Generate {
            output,
            seed,
            per_class,
        } => generate(&cli.config, &output, seed, per_class),
        Commands::Evaluate => evaluate(&cli.config),
    }
}

/// Load configuration, falling back to defaults when the file is missing
fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::from_file(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?
    } else {
        info!("Config file {} not found, using defaults", path.display());
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

/// Training and test partitions selected by the configuration
fn load_datasets(config: &Config) -> Result<(ImageDataset, ImageDataset)> {
    let num_classes = config.model.num_classes;
    if config.data.synthetic_samples > 0 {
        let n = config.data.synthetic_samples as i64;
        info!("Using synthetic dataset with {} training images", n);
        let train = ImageDataset::synthetic(n, num_classes, config.data.seed)?;
        let test = ImageDataset::synthetic((n / 5).max(num_classes), num_classes, config.data.seed + 1)?;
        return Ok((train, test));
    }

    let (train, test) = load_cifar10(Path::new(&config.data.dataset_dir))?;
    Ok((train, test))
}

fn test_loader(config: &Config, test: ImageDataset) -> DataLoader {
    DataLoader::new(test, config.data.batch_size, false, false, config.data.seed)
}

/// Train both networks
fn train(config_path: &Path, epochs: Option<usize>, synthetic: Option<usize>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }
    if let Some(n) = synthetic {
        config.data.synthetic_samples = n;
    }
    config.validate()?;

    let device = config.resolve_device()?;
    info!("Using device: {:?}", device);

    let (train, test) = load_datasets(&config)?;
    let mut train_loader = DataLoader::new(
        train,
        config.data.batch_size,
        true,
        false,
        config.data.seed,
    )
    .with_prefetch(config.data.prefetch);
    if config.data.augment {
        train_loader = train_loader.with_augmentation(Augmentation::default());
    }
    let mut test_loader = test_loader(&config, test);

    let mut model = config.build_model(device);
    let log = RunLog::open(&config.log_path(), true)?;
    let mut trainer = Trainer::new(config.training_config(), device);

    let summary = trainer.train(&mut model, &mut train_loader, &mut test_loader, &log)?;

    info!(
        "Training complete: {} epochs, {} generator / {} discriminator updates, test accuracy {:.2}%",
        summary.epochs_completed,
        summary.generator_updates,
        summary.discriminator_updates,
        summary.final_test_accuracy
    );
    Ok(())
}

/// Render a conditional sample grid
fn generate(config_path: &Path, output: &Path, seed: Option<u64>, per_class: i64) -> Result<()> {
    let config = load_config(config_path)?;
    let device = config.resolve_device()?;

    let mut model = config.build_model(device);
    let paths = config.checkpoint_paths();
    model.load_generator(&paths.generator)?;
    info!("Loaded generator from {}", paths.generator.display());

    let (codes, _) = fixed_noise(
        model.latent_dim(),
        model.num_classes(),
        per_class,
        seed.unwrap_or(config.training.fixed_noise_seed),
        device,
    )?;
    let samples = model.generate(&codes);
    save_sample_grid(&samples, output, model.num_classes())?;

    info!("Saved sample grid to {}", output.display());
    Ok(())
}

/// Report test accuracy of the stored discriminator
fn evaluate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let device = config.resolve_device()?;

    let mut model = config.build_model(device);
    let paths = config.checkpoint_paths();
    model.load_discriminator(&paths.discriminator)?;

    let (_, test) = load_datasets(&config)?;
    let mut loader = test_loader(&config, test);
    let accuracy = evaluate_accuracy(&model.discriminator, &mut loader, device)?;

    println!("Test accuracy: {:.2}%", accuracy);
    Ok(())
}

/// Initialize default configuration file
fn init_config(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    ensure_config_exists(output)?;
    info!("Created default configuration at {}", output.display());
    Ok(())
}
