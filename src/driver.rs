// src/driver.rs

//! Public lifecycle object for one tap bound to one source.
//!
//! ```text
//! new ──► (ready? polled per call) ──► { probe | run }* ──► close
//! ```
//!
//! Construction materializes the tap inputs once and triggers provisioning.
//! Every `run`/`probe` re-checks readiness. Any number of runs may be in
//! flight at once; each is tracked in the [`CommandRegistry`] until its
//! process exits. `close` stops new work and kills whatever is registered
//! at that moment. A run that already passed the closed check when `close`
//! sweeps the registry may register afterwards and is not killed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::model::SourceConfig;
use crate::errors::{DriverError, KillFailure, Result, ShutdownErrors};
use crate::exec::{run_discover, run_sync, RunSinks, SyncInvocation};
use crate::fs::{FileSystem, RealFileSystem};
use crate::materialize::{materialize, materialize_str};
use crate::parse::{JsonLinesParser, PortionConsumer, StreamParser};
use crate::provision::Provisioner;
use crate::registry::CommandRegistry;
use crate::task_log::TaskLogger;

pub const DRIVER_TYPE: &str = "singer";

const CONFIG_FILE_NAME: &str = "config.json";
const CATALOG_FILE_NAME: &str = "catalog.json";
const PROPERTIES_FILE_NAME: &str = "properties.json";
const STATE_FILE_NAME: &str = "state.json";

/// How long `close` waits for each run's supervisor to confirm a kill.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TapDriver {
    source_id: String,
    tap: String,
    config_dir: PathBuf,
    config_path: PathBuf,
    catalog_path: Option<PathBuf>,
    properties_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    closed: AtomicBool,
    registry: Arc<CommandRegistry>,
    provisioner: Arc<dyn Provisioner>,
    fs: Arc<dyn FileSystem>,
    parser: Arc<dyn StreamParser>,
    kill_timeout: Duration,
}

impl TapDriver {
    pub fn new(source: &SourceConfig, provisioner: Arc<dyn Provisioner>) -> Result<Self> {
        Self::with_filesystem(source, provisioner, Arc::new(RealFileSystem))
    }

    /// Validate `source`, write its inputs under
    /// `<install_root>/<source_id>/<tap>/` and trigger tap installation.
    pub fn with_filesystem(
        source: &SourceConfig,
        provisioner: Arc<dyn Provisioner>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        source.validate()?;
        let tap_cfg = &source.tap;

        let config_dir = provisioner
            .install_root()
            .join(&source.source_id)
            .join(&tap_cfg.tap);
        fs.create_dir_all(&config_dir).map_err(|e| {
            DriverError::Config(format!("error creating tap config dir {:?}: {e:#}", config_dir))
        })?;

        let materialize_input =
            |what: &'static str, file_name: &str, value: Option<&serde_json::Value>| {
                materialize(fs.as_ref(), &config_dir.join(file_name), value).map_err(|e| {
                    DriverError::Materialize {
                        what,
                        source: Box::new(e),
                    }
                })
            };

        let config_path = materialize_input("config", CONFIG_FILE_NAME, tap_cfg.config.as_ref())?
            .ok_or_else(|| {
                DriverError::Config(format!("config is required for tap '{}'", tap_cfg.tap))
            })?;
        let catalog_path =
            materialize_input("catalog", CATALOG_FILE_NAME, tap_cfg.catalog.as_ref())?;
        let properties_path =
            materialize_input("properties", PROPERTIES_FILE_NAME, tap_cfg.properties.as_ref())?;
        let state_path =
            materialize_input("initial state", STATE_FILE_NAME, tap_cfg.initial_state.as_ref())?;

        provisioner.ensure_installed(&tap_cfg.tap);

        info!(
            source = %source.source_id,
            tap = %tap_cfg.tap,
            dir = %config_dir.display(),
            "tap driver created"
        );

        Ok(Self {
            source_id: source.source_id.clone(),
            tap: tap_cfg.tap.clone(),
            config_dir,
            config_path,
            catalog_path,
            properties_path,
            state_path,
            closed: AtomicBool::new(false),
            registry: Arc::new(CommandRegistry::new()),
            provisioner,
            fs,
            parser: Arc::new(JsonLinesParser),
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        })
    }

    /// Replace the stdout parser used by [`TapDriver::run`].
    pub fn with_parser(mut self, parser: Arc<dyn StreamParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Bound on how long [`TapDriver::close`] waits for each kill.
    pub fn with_kill_timeout(mut self, kill_timeout: Duration) -> Self {
        self.kill_timeout = kill_timeout;
        self
    }

    pub fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn tap(&self) -> &str {
        &self.tap
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }

    pub fn properties_path(&self) -> Option<&Path> {
        self.properties_path.as_deref()
    }

    /// Initial state materialized at construction.
    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Where a per-run state override is written.
    pub fn state_override_path(&self) -> PathBuf {
        self.config_dir.join(STATE_FILE_NAME)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// `Ok(())` when the tap is installed, [`DriverError::NotReady`] while
    /// installation is still in progress. Never cached.
    pub fn ready(&self) -> Result<()> {
        if self.provisioner.is_ready(&self.tap) {
            Ok(())
        } else {
            Err(DriverError::NotReady {
                tap: self.tap.clone(),
            })
        }
    }

    pub fn active_runs(&self) -> usize {
        self.registry.len()
    }

    pub fn active_run_ids(&self) -> Vec<Uuid> {
        self.registry.ids()
    }

    /// Run the tap in sync mode until it exits.
    ///
    /// A non-empty `state` overrides the initial state for this run. It is
    /// materialized to [`TapDriver::state_override_path`] (inline JSON) or
    /// used as a path as-is.
    pub async fn run(
        &self,
        state: &str,
        logger: Arc<dyn TaskLogger>,
        consumer: Arc<dyn PortionConsumer>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        self.ready()?;

        let state_path = if state.is_empty() {
            self.state_path.clone()
        } else {
            materialize_str(self.fs.as_ref(), &self.state_override_path(), state).map_err(|e| {
                DriverError::Materialize {
                    what: "state",
                    source: Box::new(e),
                }
            })?
        };

        let invocation = SyncInvocation::new(
            &self.source_id,
            &self.tap,
            self.provisioner.tap_binary(&self.tap),
            &self.config_path,
            self.catalog_path.as_deref(),
            self.properties_path.as_deref(),
            state_path.as_deref(),
        );

        let sinks = RunSinks {
            parser: Arc::clone(&self.parser),
            consumer,
            logger,
            process_log: self.provisioner.process_log()?,
        };

        run_sync(invocation, &self.registry, sinks).await
    }

    /// Connectivity check: `<tap> -c <config> --discover`.
    pub async fn probe(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        self.ready()?;

        run_discover(self.provisioner.as_ref(), &self.tap, &self.config_path).await?;
        Ok(())
    }

    /// Reject new work and kill every registered run.
    ///
    /// Returns every kill failure in one [`ShutdownErrors`]. Safe to call
    /// more than once.
    ///
    /// The kill itself is performed by the task polling that run's future.
    /// A run whose future is no longer polled cannot answer, so each kill is
    /// bounded by the kill timeout and a timeout is recorded as a failure.
    pub async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);

        let mut pending = Vec::new();
        self.registry.for_each_and_remove(|run_id, handle| {
            info!(source = %self.source_id, %run_id, cmd = handle.command(), "killing process");
            pending.push((handle.command().to_string(), handle.kill()));
        });

        let mut errors = ShutdownErrors::default();
        for (command, kill) in pending {
            let outcome = match tokio::time::timeout(self.kill_timeout, kill.outcome()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no kill confirmation within {:?}", self.kill_timeout),
                )),
            };
            if let Err(error) = outcome {
                warn!(
                    source = %self.source_id,
                    cmd = %command,
                    error = %error,
                    "failed to kill tap process"
                );
                errors.push(KillFailure {
                    source_id: self.source_id.clone(),
                    command,
                    error,
                });
            }
        }

        errors.into_result()
    }
}

impl std::fmt::Debug for TapDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapDriver")
            .field("source_id", &self.source_id)
            .field("tap", &self.tap)
            .field("config_path", &self.config_path)
            .field("catalog_path", &self.catalog_path)
            .field("properties_path", &self.properties_path)
            .field("state_path", &self.state_path)
            .field("closed", &self.is_closed())
            .field("active_runs", &self.active_runs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TapConfig;
    use crate::fs::mock::MockFileSystem;
    use crate::provision::{BoxFuture, CapturedOutput, ProcessLog};
    use crate::registry::RunHandle;
    use serde_json::json;

    #[derive(Debug)]
    struct NeverReady;

    impl Provisioner for NeverReady {
        fn install_root(&self) -> &Path {
            Path::new("/taps")
        }

        fn ensure_installed(&self, _tap: &str) {}

        fn is_ready(&self, _tap: &str) -> bool {
            false
        }

        fn exec_binary<'a>(
            &'a self,
            _tap: &'a str,
            _args: &'a [String],
        ) -> BoxFuture<'a, Result<CapturedOutput>> {
            Box::pin(std::future::ready(Err(DriverError::Probe(
                "process must not be started".to_string(),
            ))))
        }

        fn process_log(&self) -> Result<ProcessLog> {
            Ok(Box::new(tokio::io::sink()))
        }
    }

    fn source(tap: TapConfig) -> SourceConfig {
        SourceConfig::new("src", tap)
    }

    #[test]
    fn construction_materializes_inputs_under_source_dir() {
        let fs = MockFileSystem::new();
        let cfg = TapConfig {
            tap: "tap-a".to_string(),
            config: Some(json!({"key": "v"})),
            catalog: Some(json!("/etc/catalog.json")),
            properties: None,
            initial_state: Some(json!(r#"{"bookmark":0}"#)),
        };

        let driver =
            TapDriver::with_filesystem(&source(cfg), Arc::new(NeverReady), Arc::new(fs.clone()))
                .unwrap();

        assert_eq!(driver.config_path(), Path::new("/taps/src/tap-a/config.json"));
        assert_eq!(driver.catalog_path(), Some(Path::new("/etc/catalog.json")));
        assert_eq!(driver.properties_path(), None);
        assert_eq!(driver.state_path(), Some(Path::new("/taps/src/tap-a/state.json")));
        assert_eq!(fs.write_count(), 2);
        assert!(fs.exists(Path::new("/taps/src/tap-a")));
    }

    #[test]
    fn unrecognized_shape_fails_construction() {
        let cfg = TapConfig {
            tap: "tap-a".to_string(),
            config: Some(json!({})),
            catalog: Some(json!(17)),
            ..TapConfig::default()
        };

        let err = TapDriver::with_filesystem(
            &source(cfg),
            Arc::new(NeverReady),
            Arc::new(MockFileSystem::new()),
        )
        .unwrap_err();

        match err {
            DriverError::Materialize { what, source } => {
                assert_eq!(what, "catalog");
                assert!(matches!(*source, DriverError::UnrecognizedShape));
            }
            other => panic!("expected materialize error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_when_not_ready_starts_nothing() {
        let driver = minimal_driver();

        let err = driver.probe().await.unwrap_err();
        assert!(err.is_not_ready());
    }

    #[tokio::test]
    async fn close_reports_only_the_kills_that_failed() {
        let driver = minimal_driver();
        let (failing, mut failing_rx) = RunHandle::new("tap-1");
        let (healthy, mut healthy_rx) = RunHandle::new("tap-2");
        driver.registry.register(Uuid::new_v4(), failing);
        driver.registry.register(Uuid::new_v4(), healthy);

        let supervisors = tokio::spawn(async move {
            let request = failing_rx.recv().await.unwrap();
            request.respond(Err(std::io::Error::from_raw_os_error(1)));
            let request = healthy_rx.recv().await.unwrap();
            request.respond(Ok(()));
        });

        let err = driver.close().await.unwrap_err();
        supervisors.await.unwrap();

        match err {
            DriverError::Shutdown(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors.failures()[0].command, "tap-1");
                assert_eq!(errors.failures()[0].source_id, "src");
            }
            other => panic!("expected shutdown error, got {other:?}"),
        }
        assert!(driver.registry.is_empty());
        assert!(driver.is_closed());
    }

    #[tokio::test]
    async fn close_gives_up_on_a_run_that_never_answers() {
        let driver = minimal_driver().with_kill_timeout(Duration::from_millis(50));
        let (stalled, _stalled_rx) = RunHandle::new("tap-1");
        driver.registry.register(Uuid::new_v4(), stalled);

        let err = driver.close().await.unwrap_err();

        match err {
            DriverError::Shutdown(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors.failures()[0].error.kind(), std::io::ErrorKind::TimedOut);
            }
            other => panic!("expected shutdown error, got {other:?}"),
        }
        assert!(driver.registry.is_empty());
    }

    fn minimal_driver() -> TapDriver {
        let cfg = TapConfig {
            tap: "tap-a".to_string(),
            config: Some(json!({})),
            ..TapConfig::default()
        };
        TapDriver::with_filesystem(
            &source(cfg),
            Arc::new(NeverReady),
            Arc::new(MockFileSystem::new()),
        )
        .unwrap()
    }
}
