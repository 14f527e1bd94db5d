//! Training metrics for monitoring GAN progress
//!
//! `RunningMetrics` accumulates per-batch discriminator statistics within an
//! epoch; `TrainingMetrics` keeps one summary row per finished epoch.

use std::path::Path;

/// Statistics recorded for one discriminator update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchStats {
    /// Gradient penalty term
    pub gradient_penalty: f64,
    /// Mean realness score of generated images
    pub fake_score: f64,
    /// Mean realness score of real images
    pub real_score: f64,
    /// Classification loss on real images
    pub real_class_loss: f64,
    /// Classification loss on generated images
    pub fake_class_loss: f64,
    /// Classification accuracy on the real batch, in percent
    pub accuracy: f64,
}

/// Per-epoch accumulation of the five cost components and train accuracy
#[derive(Debug, Clone, Default)]
pub struct RunningMetrics {
    gradient_penalty: Vec<f64>,
    fake_score: Vec<f64>,
    real_score: Vec<f64>,
    real_class_loss: Vec<f64>,
    fake_class_loss: Vec<f64>,
    accuracy: Vec<f64>,
}

impl RunningMetrics {
    /// Create empty accumulators
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the statistics of one batch
    pub fn record(&mut self, stats: &BatchStats) {
        self.gradient_penalty.push(stats.gradient_penalty);
        self.fake_score.push(stats.fake_score);
        self.real_score.push(stats.real_score);
        self.real_class_loss.push(stats.real_class_loss);
        self.fake_class_loss.push(stats.fake_class_loss);
        self.accuracy.push(stats.accuracy);
    }

    /// Number of recorded batches
    pub fn len(&self) -> usize {
        self.accuracy.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.accuracy.is_empty()
    }

    /// Mean of every stream (all zeros when empty)
    pub fn means(&self) -> BatchStats {
        BatchStats {
            gradient_penalty: mean(&self.gradient_penalty),
            fake_score: mean(&self.fake_score),
            real_score: mean(&self.real_score),
            real_class_loss: mean(&self.real_class_loss),
            fake_class_loss: mean(&self.fake_class_loss),
            accuracy: mean(&self.accuracy),
        }
    }
}

/// Summary of one finished epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    /// Zero-based epoch index
    pub epoch: usize,
    /// Means of the batch statistics
    pub means: BatchStats,
    /// Held-out accuracy in percent
    pub test_accuracy: f64,
    /// Wall-clock seconds since training start
    pub elapsed_secs: f64,
}

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    epochs: Vec<EpochRecord>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch metrics
    pub fn record_epoch(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// All recorded epochs
    pub fn epochs(&self) -> &[EpochRecord] {
        &self.epochs
    }

    /// Latest test accuracy
    pub fn latest_test_accuracy(&self) -> Option<f64> {
        self.epochs.last().map(|r| r.test_accuracy)
    }

    /// Save metrics to CSV file
    pub fn save_csv(&self, path: &Path) -> crate::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record([
            "epoch",
            "gradient_penalty",
            "fake_score",
            "real_score",
            "real_class_loss",
            "fake_class_loss",
            "train_accuracy",
            "test_accuracy",
            "elapsed_secs",
        ])?;

        for r in &self.epochs {
            writer.write_record([
                r.epoch.to_string(),
                r.means.gradient_penalty.to_string(),
                r.means.fake_score.to_string(),
                r.means.real_score.to_string(),
                r.means.real_class_loss.to_string(),
                r.means.fake_class_loss.to_string(),
                r.means.accuracy.to_string(),
                r.test_accuracy.to_string(),
                r.elapsed_secs.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load metrics from CSV file
    pub fn load_csv(path: &Path) -> crate::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut metrics = Self::new();

        for result in reader.records() {
            let record = result?;
            let field = |i: usize| -> crate::Result<f64> {
                record[i].parse().map_err(|e| {
                    crate::Error::DatasetError(format!("bad metrics field {}: {}", i, e))
                })
            };
            metrics.epochs.push(EpochRecord {
                epoch: field(0)? as usize,
                means: BatchStats {
                    gradient_penalty: field(1)?,
                    fake_score: field(2)?,
                    real_score: field(3)?,
                    real_class_loss: field(4)?,
                    fake_class_loss: field(5)?,
                    accuracy: field(6)?,
                },
                test_accuracy: field(7)?,
                elapsed_secs: field(8)?,
            });
        }

        Ok(metrics)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(base: f64) -> BatchStats {
        BatchStats {
            gradient_penalty: base,
            fake_score: base + 1.0,
            real_score: base + 2.0,
            real_class_loss: base + 3.0,
            fake_class_loss: base + 4.0,
            accuracy: base * 10.0,
        }
    }

    #[test]
    fn test_running_means() {
        let mut metrics = RunningMetrics::new();
        assert!(metrics.is_empty());
        assert_eq!(metrics.means(), BatchStats::default());

        metrics.record(&stats(1.0));
        metrics.record(&stats(3.0));

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.means(), stats(2.0));
    }

    #[test]
    fn test_training_metrics_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(EpochRecord {
            epoch: 0,
            means: stats(0.5),
            test_accuracy: 31.25,
            elapsed_secs: 12.0,
        });
        metrics.record_epoch(EpochRecord {
            epoch: 1,
            means: stats(0.25),
            test_accuracy: 40.0,
            elapsed_secs: 24.5,
        });
        metrics.save_csv(&path).unwrap();

        let loaded = TrainingMetrics::load_csv(&path).unwrap();
        assert_eq!(loaded.epochs(), metrics.epochs());
        assert_eq!(loaded.latest_test_accuracy(), Some(40.0));
    }
}
