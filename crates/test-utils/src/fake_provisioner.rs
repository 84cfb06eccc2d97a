use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tapdriver::errors::Result;
use tapdriver::provision::{BoxFuture, CapturedOutput, LocalProvisioner, ProcessLog, Provisioner};
use tokio::io::AsyncWrite;

/// A provisioner whose readiness is toggled by the test.
///
/// - records `ensure_installed` and `exec_binary` calls
/// - runs binaries from `root` the same way `LocalProvisioner` does
/// - collects everything written to the process log in memory
#[derive(Debug)]
pub struct FakeProvisioner {
    root: PathBuf,
    ready: AtomicBool,
    installs: Mutex<Vec<String>>,
    execs: Mutex<Vec<Vec<String>>>,
    process_log: Arc<Mutex<Vec<u8>>>,
}

impl FakeProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ready: AtomicBool::new(true),
            installs: Mutex::new(Vec::new()),
            execs: Mutex::new(Vec::new()),
            process_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }

    pub fn execs(&self) -> Vec<Vec<String>> {
        self.execs.lock().unwrap().clone()
    }

    pub fn process_log_text(&self) -> String {
        String::from_utf8_lossy(&self.process_log.lock().unwrap()).into_owned()
    }
}

impl Provisioner for FakeProvisioner {
    fn install_root(&self) -> &Path {
        &self.root
    }

    fn ensure_installed(&self, tap: &str) {
        self.installs.lock().unwrap().push(tap.to_string());
    }

    fn is_ready(&self, _tap: &str) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn exec_binary<'a>(
        &'a self,
        tap: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<CapturedOutput>> {
        self.execs.lock().unwrap().push(args.to_vec());
        Box::pin(async move {
            let local = LocalProvisioner::new(&self.root);
            local.exec_binary(tap, args).await
        })
    }

    fn process_log(&self) -> Result<ProcessLog> {
        Ok(Box::new(SharedBuffer(Arc::clone(&self.process_log))))
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
