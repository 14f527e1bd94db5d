//! Checkpoint save/load utilities
//!
//! A checkpoint is a pair of variable-store files, one per network,
//! overwritten in place every epoch.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::ConditionalWgan;

/// Locations of the two network snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointPaths {
    /// Generator weights
    pub generator: PathBuf,
    /// Discriminator weights
    pub discriminator: PathBuf,
}

impl CheckpointPaths {
    /// Create from explicit paths
    pub fn new(generator: impl Into<PathBuf>, discriminator: impl Into<PathBuf>) -> Self {
        Self {
            generator: generator.into(),
            discriminator: discriminator.into(),
        }
    }

    /// Default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("generator.ot"), dir.join("discriminator.ot"))
    }

    /// Check that both files exist
    pub fn exists(&self) -> bool {
        self.generator.exists() && self.discriminator.exists()
    }
}

/// Save both networks, creating parent directories as needed
pub fn save_checkpoint(model: &ConditionalWgan, paths: &CheckpointPaths) -> Result<()> {
    for path in [&paths.generator, &paths.discriminator] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CheckpointIoError {
                    path: parent.to_path_buf(),
                    source: tch::TchError::Io(e),
                })?;
            }
        }
    }

    model.save(&paths.generator, &paths.discriminator)?;
    tracing::debug!(
        "Saved checkpoint to {} and {}",
        paths.generator.display(),
        paths.discriminator.display()
    );
    Ok(())
}

/// Load both networks
pub fn load_checkpoint(model: &mut ConditionalWgan, paths: &CheckpointPaths) -> Result<()> {
    model.load(&paths.generator, &paths.discriminator)?;
    tracing::info!(
        "Loaded checkpoint from {} and {}",
        paths.generator.display(),
        paths.discriminator.display()
    );
    Ok(())
}
