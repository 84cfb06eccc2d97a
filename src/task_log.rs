// src/task_log.rs

//! Run-scoped logger, separate from the process-wide `tracing` output.

use tracing::Level;

/// Leveled sink for a single run's audit trail.
pub trait TaskLogger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

/// Emits task log lines as `tracing` events tagged with `task_id`.
#[derive(Debug, Clone)]
pub struct TracingTaskLogger {
    task_id: String,
}

impl TracingTaskLogger {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl TaskLogger for TracingTaskLogger {
    fn log(&self, level: Level, message: &str) {
        let task_id = self.task_id.as_str();
        if level == Level::ERROR {
            tracing::error!(target: "tapdriver::task", task_id, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "tapdriver::task", task_id, "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "tapdriver::task", task_id, "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "tapdriver::task", task_id, "{message}");
        } else {
            tracing::trace!(target: "tapdriver::task", task_id, "{message}");
        }
    }
}
