//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities
//! - Run-scoped logging
//! - Sample grid rendering

mod checkpoint;
mod config;
mod grid;
mod logging;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointPaths};
pub use config::{
    ensure_config_exists, Config, DataConfig, ModelConfig, OutputConfig, TrainingConfigFile,
};
pub use grid::{grid_tensor, save_sample_grid};
pub use logging::{setup_logging, RunLog};
