// src/provision.rs

//! Provisioning collaborator.
//!
//! The driver never installs taps itself. It is handed an `Arc<dyn
//! Provisioner>` at construction and only asks it three things: kick off an
//! installation, report whether a tap is runnable, and run the installed
//! binary in capture mode for discovery. The provisioner also owns the
//! installation root and the shared sink that tap diagnostics are copied to.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWrite;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{DriverError, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared sink tap stderr is copied into.
pub type ProcessLog = Box<dyn AsyncWrite + Send + Unpin>;

/// Output of a process run to completion with both streams buffered.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub trait Provisioner: Send + Sync {
    /// Directory holding installed taps and per-source config files.
    fn install_root(&self) -> &Path;

    /// Fire-and-forget trigger to install or upgrade `tap`.
    fn ensure_installed(&self, tap: &str);

    /// Whether `tap` is installed and runnable right now.
    fn is_ready(&self, tap: &str) -> bool;

    /// Executable path for `tap`.
    fn tap_binary(&self, tap: &str) -> PathBuf {
        self.install_root().join(tap).join("bin").join(tap)
    }

    /// Run the installed `tap` binary with `args`, buffering stdout and
    /// stderr. A non-success exit is reported through
    /// [`CapturedOutput::status`], not as an error.
    fn exec_binary<'a>(
        &'a self,
        tap: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<CapturedOutput>>;

    /// Open the shared diagnostic sink.
    fn process_log(&self) -> Result<ProcessLog>;
}

/// Provisioner for taps installed out of band under `install_root`.
///
/// A tap is ready as soon as `<install_root>/<tap>/bin/<tap>` exists; this
/// is re-checked on every call.
#[derive(Debug, Clone)]
pub struct LocalProvisioner {
    install_root: PathBuf,
    process_log: Option<PathBuf>,
}

impl LocalProvisioner {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            process_log: None,
        }
    }

    /// Append tap diagnostics to `path` instead of stderr.
    pub fn with_process_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.process_log = Some(path.into());
        self
    }
}

impl Provisioner for LocalProvisioner {
    fn install_root(&self) -> &Path {
        &self.install_root
    }

    fn ensure_installed(&self, tap: &str) {
        if self.is_ready(tap) {
            debug!(tap, "tap already installed");
        } else {
            warn!(
                tap,
                binary = %self.tap_binary(tap).display(),
                "tap binary not found; waiting for it to be installed"
            );
        }
    }

    fn is_ready(&self, tap: &str) -> bool {
        self.tap_binary(tap).is_file()
    }

    fn exec_binary<'a>(
        &'a self,
        tap: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<CapturedOutput>> {
        Box::pin(async move {
            let binary = self.tap_binary(tap);
            let output = Command::new(&binary)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| DriverError::Spawn {
                    command: binary.display().to_string(),
                    source,
                })?;

            Ok(CapturedOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        })
    }

    fn process_log(&self) -> Result<ProcessLog> {
        match &self.process_log {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Ok(Box::new(tokio::fs::File::from_std(file)))
            }
            None => Ok(Box::new(tokio::io::stderr())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_binary_lives_under_install_root() {
        let p = LocalProvisioner::new("/opt/taps");
        assert_eq!(
            p.tap_binary("tap-csv"),
            PathBuf::from("/opt/taps/tap-csv/bin/tap-csv")
        );
    }

    #[test]
    fn readiness_is_rechecked_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let p = LocalProvisioner::new(dir.path());
        assert!(!p.is_ready("tap-csv"));

        let bin_dir = dir.path().join("tap-csv").join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::fs::write(bin_dir.join("tap-csv"), b"").unwrap();

        assert!(p.is_ready("tap-csv"));
    }
}
