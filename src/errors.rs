// src/errors.rs

//! Crate-wide error type.

use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("tap '{tap}' isn't ready yet: tap is being installed")]
    NotReady { tap: String },

    #[error("tap driver has already been closed")]
    Closed,

    #[error("unrecognized configuration shape: value must be a path to a JSON file or raw JSON")]
    UnrecognizedShape,

    #[error("error materializing {what}: {source}")]
    Materialize {
        what: &'static str,
        #[source]
        source: Box<DriverError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start tap process {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse output error: {0}")]
    Parse(String),

    #[error("tap process exited with {status}")]
    Exit { status: ExitStatus },

    #[error("waiting for tap process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("tap discover failed: {0}")]
    Probe(String),

    #[error(transparent)]
    Shutdown(#[from] ShutdownErrors),

    #[error("{0} task panicked")]
    TaskPanicked(&'static str),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriverError {
    /// True for the recoverable "installation still in progress" condition.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DriverError::NotReady { .. })
    }
}

/// One process that could not be terminated during shutdown.
#[derive(Debug)]
pub struct KillFailure {
    pub source_id: String,
    pub command: String,
    pub error: std::io::Error,
}

impl fmt::Display for KillFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] error killing tap sync command {}: {}",
            self.source_id, self.command, self.error
        )
    }
}

/// Every termination failure collected by a single shutdown.
#[derive(Debug, Default)]
pub struct ShutdownErrors {
    failures: Vec<KillFailure>,
}

impl ShutdownErrors {
    pub fn push(&mut self, failure: KillFailure) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[KillFailure] {
        &self.failures
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate as an error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DriverError::Shutdown(self))
        }
    }
}

impl fmt::Display for ShutdownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred:", self.failures.len(), noun)?;
        for failure in &self.failures {
            write!(f, "\n\t* {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownErrors {}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DriverError>;
