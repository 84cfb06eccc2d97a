// src/registry.rs

//! Registry of in-flight tap processes.
//!
//! Each run registers a [`RunHandle`] under a fresh run id for as long as
//! its process is alive. Registration, deregistration and the shutdown
//! sweep all go through one mutex, held only for the map operation itself.
//!
//! A handle doesn't own the process. Killing goes through a channel to the
//! supervisor that is waiting on the child, which performs the kill and
//! replies with the outcome.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

/// Asks the owning supervisor to kill its process.
#[derive(Debug)]
pub struct KillRequest {
    pub(crate) reply: oneshot::Sender<io::Result<()>>,
}

impl KillRequest {
    /// Report the outcome of the kill back to the requester.
    pub fn respond(self, outcome: io::Result<()>) {
        let _ = self.reply.send(outcome);
    }
}

pub type KillReceiver = mpsc::UnboundedReceiver<KillRequest>;

/// Handle on a running tap process.
#[derive(Debug, Clone)]
pub struct RunHandle {
    command: String,
    kill_tx: mpsc::UnboundedSender<KillRequest>,
}

impl RunHandle {
    /// Create a handle for `command` and the receiver its supervisor must
    /// poll for kill requests.
    pub fn new(command: impl Into<String>) -> (Self, KillReceiver) {
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        (
            Self {
                command: command.into(),
                kill_tx,
            },
            kill_rx,
        )
    }

    /// Command line this handle was created for.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Request a forcible kill. The request is sent immediately; await the
    /// returned [`PendingKill`] for the outcome.
    pub fn kill(&self) -> PendingKill {
        let (reply, rx) = oneshot::channel();
        match self.kill_tx.send(KillRequest { reply }) {
            Ok(()) => PendingKill(Some(rx)),
            Err(_) => PendingKill(None),
        }
    }
}

/// Outcome of a kill request that has already been delivered.
#[derive(Debug)]
pub struct PendingKill(Option<oneshot::Receiver<io::Result<()>>>);

impl PendingKill {
    /// Resolve to the kill result. A process whose supervisor has already
    /// observed its exit counts as terminated.
    pub async fn outcome(self) -> io::Result<()> {
        match self.0 {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

/// Run id -> live process handle.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Mutex<HashMap<Uuid, RunHandle>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RunHandle>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: Uuid, handle: RunHandle) {
        debug!(run_id = %id, command = handle.command(), "registering tap process");
        self.lock().insert(id, handle);
    }

    pub fn deregister(&self, id: &Uuid) -> Option<RunHandle> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            debug!(run_id = %id, "deregistered tap process");
        }
        removed
    }

    /// Register `handle` and return a guard that deregisters it on drop.
    pub fn register_scoped(self: &Arc<Self>, id: Uuid, handle: RunHandle) -> Registration {
        self.register(id, handle);
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.lock().keys().copied().collect()
    }

    /// Visit and remove every entry inside a single critical section.
    ///
    /// Runs registered after the sweep starts wait for the lock and are not
    /// visited.
    pub fn for_each_and_remove<F>(&self, mut f: F)
    where
        F: FnMut(Uuid, RunHandle),
    {
        let mut commands = self.lock();
        for (id, handle) in commands.drain() {
            f(id, handle);
        }
    }
}

/// Keeps a run registered until dropped.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<CommandRegistry>,
    id: Uuid,
}

impl Registration {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_registration_is_removed_on_drop() {
        let registry = Arc::new(CommandRegistry::new());
        let (handle, _rx) = RunHandle::new("tap-a");

        let guard = registry.register_scoped(Uuid::new_v4(), handle);
        assert_eq!(registry.ids(), vec![guard.id()]);

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_visits_everything_and_empties_registry() {
        let registry = CommandRegistry::new();
        let mut receivers = Vec::new();
        for name in ["a", "b", "c"] {
            let (handle, rx) = RunHandle::new(name);
            receivers.push(rx);
            registry.register(Uuid::new_v4(), handle);
        }

        let mut seen = Vec::new();
        registry.for_each_and_remove(|_, handle| seen.push(handle.command().to_string()));
        seen.sort();

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn kill_reports_supervisor_outcome() {
        let (handle, mut rx) = RunHandle::new("tap-a");
        let pending = handle.kill();

        let request = rx.recv().await.unwrap();
        request.respond(Err(io::Error::other("no such process")));

        let err = pending.outcome().await.unwrap_err();
        assert_eq!(err.to_string(), "no such process");
    }

    #[tokio::test]
    async fn kill_after_supervisor_exit_counts_as_terminated() {
        let (handle, rx) = RunHandle::new("tap-a");
        drop(rx);

        assert!(handle.kill().outcome().await.is_ok());
    }
}
