// src/lib.rs

pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod materialize;
pub mod parse;
pub mod provision;
pub mod registry;
pub mod task_log;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{CliArgs, CliCommand};
use crate::config::loader::load_and_validate;
use crate::parse::StdoutConsumer;
use crate::provision::LocalProvisioner;
use crate::task_log::TracingTaskLogger;

pub use crate::driver::TapDriver;
pub use crate::errors::{DriverError, ShutdownErrors};

/// High-level entry point used by `main.rs`.
///
/// Loads the driver file, builds a [`TapDriver`] on a [`LocalProvisioner`]
/// and runs the requested command. During `sync`, Ctrl-C closes the driver,
/// which kills the running tap.
pub async fn run(args: CliArgs) -> Result<()> {
    let file = load_and_validate(&args.config)?;

    let mut provisioner = LocalProvisioner::new(&file.driver.install_root);
    if let Some(ref log) = file.driver.process_log {
        provisioner = provisioner.with_process_log(log);
    }

    let driver = Arc::new(TapDriver::new(&file.source, Arc::new(provisioner))?);

    match args.command {
        CliCommand::Probe => {
            driver.probe().await?;
            info!(source = driver.source_id(), tap = driver.tap(), "probe succeeded");
        }
        CliCommand::Sync { state } => {
            {
                let driver = Arc::clone(&driver);
                tokio::spawn(async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        eprintln!("failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    warn!("interrupted; closing tap driver");
                    if let Err(e) = driver.close().await {
                        warn!(error = %e, "closing tap driver");
                    }
                });
            }

            let task_id = format!("{}_{}", driver.source_id(), driver.tap());
            driver
                .run(
                    &state,
                    Arc::new(TracingTaskLogger::new(task_id)),
                    Arc::new(StdoutConsumer),
                )
                .await?;
            info!(source = driver.source_id(), tap = driver.tap(), "sync finished");
        }
    }

    Ok(())
}
