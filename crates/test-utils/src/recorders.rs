use std::sync::Mutex;

use tapdriver::errors::{DriverError, Result};
use tapdriver::parse::{Portion, PortionConsumer};
use tapdriver::task_log::TaskLogger;
use tracing::Level;

/// Consumer that keeps every portion, optionally rejecting after `limit`.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    portions: Mutex<Vec<Portion>>,
    limit: Option<usize>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `limit` portions, then fail.
    pub fn failing_after(limit: usize) -> Self {
        Self {
            portions: Mutex::new(Vec::new()),
            limit: Some(limit),
        }
    }

    pub fn portions(&self) -> Vec<Portion> {
        self.portions.lock().unwrap().clone()
    }
}

impl PortionConsumer for RecordingConsumer {
    fn consume(&self, portion: Portion) -> Result<()> {
        let mut portions = self.portions.lock().unwrap();
        if self.limit.is_some_and(|limit| portions.len() >= limit) {
            return Err(DriverError::Other(anyhow::anyhow!("sink is full")));
        }
        portions.push(portion);
        Ok(())
    }
}

/// Task logger that keeps every line.
#[derive(Debug, Default)]
pub struct RecordingTaskLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingTaskLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(level, _)| *level == Level::ERROR)
            .map(|(_, line)| line)
            .collect()
    }
}

impl TaskLogger for RecordingTaskLogger {
    fn log(&self, level: Level, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}
