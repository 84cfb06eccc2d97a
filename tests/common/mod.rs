#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tapdriver::config::SourceConfig;
use tapdriver::TapDriver;
use tempfile::TempDir;

pub use tapdriver_test_utils::builders::TapConfigBuilder;
pub use tapdriver_test_utils::fake_provisioner::FakeProvisioner;
pub use tapdriver_test_utils::recorders::{RecordingConsumer, RecordingTaskLogger};
pub use tapdriver_test_utils::{init_tracing, with_timeout};

/// Scratch install root with a fake provisioner pointing at it.
pub struct Harness {
    pub dir: TempDir,
    pub provisioner: Arc<FakeProvisioner>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("creating install root");
        let provisioner = Arc::new(FakeProvisioner::new(dir.path()));
        Self { dir, provisioner }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path a fake tap can write its argv to (one argument per line).
    pub fn args_file(&self) -> PathBuf {
        self.root().join("args.txt")
    }

    pub fn recorded_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.args_file())
            .expect("fake tap did not record its arguments")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    pub fn install_tap(&self, tap: &str, body: &str) -> PathBuf {
        tapdriver_test_utils::write_tap_script(self.root(), tap, body)
    }

    pub fn driver(&self, source: &SourceConfig) -> TapDriver {
        TapDriver::new(source, self.provisioner.clone()).expect("constructing driver")
    }
}

/// Shell line that records argv into `args_file`.
pub fn record_args_line(args_file: &Path) -> String {
    format!("printf '%s\\n' \"$@\" > '{}'\n", args_file.display())
}
