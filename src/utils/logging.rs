//! Logging setup
//!
//! `setup_logging` installs the process-wide console subscriber used by the
//! binary. `RunLog` is the logging context of a single training run: it
//! routes the events of the current thread into an append-only log file for
//! as long as it is alive.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Setup logging with the specified level
pub fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .try_init()
        .ok();
}

/// Run-scoped log: timestamped lines appended to a file, warnings echoed to stdout
pub struct RunLog {
    path: PathBuf,
    echo: bool,
    _guard: DefaultGuard,
}

impl RunLog {
    /// Open (or create) the log file and route this thread's events into it
    ///
    /// # Arguments
    ///
    /// * `path` - Log file, appended to if it exists
    /// * `echo` - Also print progress summaries to stdout
    pub fn open(path: &Path, echo: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::INFO);
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout.with_max_level(Level::WARN))
            .with_target(false);

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer);
        let guard = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            path: path.to_path_buf(),
            echo,
            _guard: guard,
        })
    }

    /// Record a progress summary in the log and, when echoing, on stdout
    pub fn summary(&self, line: &str) {
        tracing::info!("{}", line);
        if self.echo {
            println!("{}", line);
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}
