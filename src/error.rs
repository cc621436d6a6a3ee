//! Error taxonomy of the execution core.
//!
//! Built-in bodies use [`anyhow`] and are caught at the invocation boundary; the
//! variants here are the failures the executor itself reports before moving on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while wiring or running an invocation.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The redirect target could not be created, opened or flushed.
    #[error("Redirect error: {0}")]
    Redirect(#[source] io::Error),
    /// A process chain could not be launched or awaited.
    #[error("Pipeline error: {0}")]
    Pipeline(#[source] io::Error),
}

/// Failures while loading the TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
