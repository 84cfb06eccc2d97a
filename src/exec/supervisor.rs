// src/exec/supervisor.rs

//! Supervises one tap sync process.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{DriverError, Result};
use crate::parse::{PortionConsumer, StreamParser};
use crate::provision::ProcessLog;
use crate::registry::{CommandRegistry, KillReceiver, RunHandle};
use crate::task_log::TaskLogger;

/// Everything needed to spawn one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInvocation {
    pub source_id: String,
    pub tap: String,
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl SyncInvocation {
    /// Build `-c <config> [--catalog <c>] [-p <p>] [--state <s>]`.
    pub fn new(
        source_id: &str,
        tap: &str,
        command: PathBuf,
        config: &Path,
        catalog: Option<&Path>,
        properties: Option<&Path>,
        state: Option<&Path>,
    ) -> Self {
        let mut args = vec!["-c".to_string(), config.display().to_string()];

        if let Some(catalog) = catalog {
            args.push("--catalog".to_string());
            args.push(catalog.display().to_string());
        }

        if let Some(properties) = properties {
            args.push("-p".to_string());
            args.push(properties.display().to_string());
        }

        if let Some(state) = state {
            args.push("--state".to_string());
            args.push(state.display().to_string());
        }

        Self {
            source_id: source_id.to_string(),
            tap: tap.to_string(),
            command,
            args,
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.command.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn label(&self) -> String {
        format!("{}_{}", self.source_id, self.tap)
    }
}

/// Collaborators a run streams into.
pub struct RunSinks {
    pub parser: Arc<dyn StreamParser>,
    pub consumer: Arc<dyn PortionConsumer>,
    pub logger: Arc<dyn TaskLogger>,
    pub process_log: ProcessLog,
}

/// Spawn the tap, stream its output and wait for it to exit.
///
/// The run stays registered in `registry` from spawn until this function
/// returns, on every path. stdout goes to the parser and stderr is copied
/// verbatim to the process log, each on its own task. A parse failure asks
/// the supervisor to kill the process.
///
/// A non-success exit is the reported outcome. If the process exits
/// cleanly despite a parse failure, the parse error is returned instead.
pub async fn run_sync(
    invocation: SyncInvocation,
    registry: &Arc<CommandRegistry>,
    sinks: RunSinks,
) -> Result<()> {
    let command_line = invocation.command_line();
    let label = invocation.label();

    sinks.logger.info(&format!("exec tap {command_line}"));
    info!(
        source = %invocation.source_id,
        tap = %invocation.tap,
        cmd = %command_line,
        "starting tap process"
    );

    let mut child = Command::new(&invocation.command)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| DriverError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    let run_id = Uuid::new_v4();
    let (handle, kill_rx) = RunHandle::new(command_line);
    let self_kill = handle.clone();
    let _registration = registry.register_scoped(run_id, handle);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("tap stdout unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("tap stderr unavailable"))?;

    let parse_task = tokio::spawn(parse_output(
        stdout,
        sinks.parser,
        sinks.consumer,
        sinks.logger,
        self_kill,
        label.clone(),
    ));
    let copy_task = tokio::spawn(copy_diagnostics(stderr, sinks.process_log, label.clone()));

    let (parse_res, copy_res, status) =
        tokio::join!(parse_task, copy_task, wait_or_kill(&mut child, kill_rx));

    let parse_err = match parse_res {
        Ok(parse_err) => parse_err,
        Err(join_err) => {
            error!(run = %label, run_id = %run_id, error = %join_err, "parse task failed");
            Some(DriverError::TaskPanicked("parse"))
        }
    };
    if let Err(join_err) = copy_res {
        warn!(run = %label, run_id = %run_id, error = %join_err, "stderr copy task failed");
    }

    let status = status.map_err(DriverError::Wait)?;
    info!(
        run = %label,
        run_id = %run_id,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "tap process exited"
    );

    if !status.success() {
        return Err(DriverError::Exit { status });
    }

    match parse_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Wait for `child`, serving kill requests until it exits.
async fn wait_or_kill(child: &mut Child, mut kill_rx: KillReceiver) -> std::io::Result<ExitStatus> {
    loop {
        tokio::select! {
            status = child.wait() => return status,
            Some(request) = kill_rx.recv() => {
                let outcome = child.start_kill();
                debug!(ok = outcome.is_ok(), "kill requested for tap process");
                request.respond(outcome);
            }
        }
    }
}

async fn parse_output<R>(
    stdout: R,
    parser: Arc<dyn StreamParser>,
    consumer: Arc<dyn PortionConsumer>,
    logger: Arc<dyn TaskLogger>,
    kill: RunHandle,
    label: String,
) -> Option<DriverError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let err = parser
        .parse(Box::new(stdout), consumer.as_ref(), logger.as_ref())
        .await
        .err()?;

    logger.error(&format!("Parse output error: {err}. Process will be killed"));
    error!(run = %label, error = %err, "parse output error; process will be killed");

    if let Err(kill_err) = kill.kill().outcome().await {
        logger.error(&format!("Error killing process: {kill_err}"));
        error!(run = %label, error = %kill_err, "error killing process");
    }

    Some(err)
}

async fn copy_diagnostics<R>(mut stderr: R, mut process_log: ProcessLog, label: String)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    match tokio::io::copy(&mut stderr, &mut process_log).await {
        Ok(bytes) => debug!(run = %label, bytes, "tap stderr closed"),
        Err(e) => warn!(run = %label, error = %e, "copying tap stderr to process log"),
    }
    if let Err(e) = process_log.flush().await {
        warn!(run = %label, error = %e, "flushing process log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_only_include_present_inputs() {
        let inv = SyncInvocation::new(
            "src",
            "tap-a",
            PathBuf::from("/taps/tap-a/bin/tap-a"),
            Path::new("/cfg/config.json"),
            None,
            Some(Path::new("/cfg/properties.json")),
            None,
        );

        assert_eq!(inv.args, vec!["-c", "/cfg/config.json", "-p", "/cfg/properties.json"]);
        assert_eq!(
            inv.command_line(),
            "/taps/tap-a/bin/tap-a -c /cfg/config.json -p /cfg/properties.json"
        );
    }

    #[test]
    fn args_follow_fixed_flag_order() {
        let inv = SyncInvocation::new(
            "src",
            "tap-a",
            PathBuf::from("tap-a"),
            Path::new("c.json"),
            Some(Path::new("cat.json")),
            Some(Path::new("p.json")),
            Some(Path::new("s.json")),
        );

        assert_eq!(
            inv.args,
            vec!["-c", "c.json", "--catalog", "cat.json", "-p", "p.json", "--state", "s.json"]
        );
    }
}
