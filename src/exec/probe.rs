// src/exec/probe.rs

//! Discovery dry-run used as a connectivity check.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::{DriverError, Result};
use crate::provision::{CapturedOutput, Provisioner};

pub fn discover_args(config: &Path) -> Vec<String> {
    vec![
        "-c".to_string(),
        config.display().to_string(),
        "--discover".to_string(),
    ]
}

/// Run `<tap> -c <config> --discover` to completion.
///
/// Unlike a sync run, any stderr output counts as a failure here, even when
/// the tap exits successfully.
pub async fn run_discover(
    provisioner: &dyn Provisioner,
    tap: &str,
    config: &Path,
) -> Result<CapturedOutput> {
    let args = discover_args(config);
    info!(tap, args = %args.join(" "), "running tap discover");

    let output = provisioner
        .exec_binary(tap, &args)
        .await
        .map_err(|err| DriverError::Probe(err.to_string()))?;

    let diagnostics = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return Err(DriverError::Probe(format!(
            "tap exited with {}. {}",
            output.status,
            diagnostics.trim_end()
        )));
    }

    if !output.stderr.is_empty() {
        return Err(DriverError::Probe(format!(
            "tap wrote diagnostics: {}",
            diagnostics.trim_end()
        )));
    }

    debug!(tap, stdout_bytes = output.stdout.len(), "tap discover succeeded");
    Ok(output)
}
