//! Error types for the conditional WGAN-GP trainer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid hyperparameter or path combination
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Tensor does not have the expected rank or shape
    #[error("Unexpected tensor shape: expected {expected:?}, got {actual:?}")]
    DataShapeError { expected: Vec<i64>, actual: Vec<i64> },

    /// Requested accelerator is not usable
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Writing or reading a network snapshot failed
    #[error("Checkpoint I/O failed for {path}: {source}")]
    CheckpointIoError {
        path: PathBuf,
        #[source]
        source: tch::TchError,
    },

    /// Dataset could not be loaded or is malformed
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// Optimizer received a gradient list that does not match its parameters
    #[error("Gradient count mismatch: optimizer holds {expected} parameters, got {actual} gradients")]
    GradientMismatch { expected: usize, actual: usize },

    /// Error raised by libtorch
    #[error("Torch error: {0}")]
    TorchError(#[from] tch::TchError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl Error {
    /// Check whether the training loop may skip the offending batch and continue.
    ///
    /// Only an undersized batch qualifies: same per-sample shape as expected,
    /// but fewer rows. Everything else is fatal to the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::DataShapeError { expected, actual } => {
                expected.len() == actual.len()
                    && !expected.is_empty()
                    && actual[0] < expected[0]
                    && expected[1..] == actual[1..]
            }
            _ => false,
        }
    }

    /// Build a shape error from two tensor shapes
    pub fn shape(expected: &[i64], actual: &[i64]) -> Self {
        Error::DataShapeError {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undersized_batch_is_recoverable() {
        let err = Error::shape(&[100, 3, 32, 32], &[56, 3, 32, 32]);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_shape_errors_are_fatal() {
        assert!(!Error::shape(&[100, 3, 32, 32], &[100, 1, 32, 32]).is_recoverable());
        assert!(!Error::shape(&[100, 3, 32, 32], &[56, 1, 32, 32]).is_recoverable());
        assert!(!Error::shape(&[100, 3, 32, 32], &[56, 3, 32]).is_recoverable());
        assert!(!Error::shape(&[100, 3, 32, 32], &[128, 3, 32, 32]).is_recoverable());
    }

    #[test]
    fn test_non_shape_errors_are_fatal() {
        assert!(!Error::ConfigError("batch size".into()).is_recoverable());
        assert!(!Error::DeviceError("cuda".into()).is_recoverable());
    }
}
