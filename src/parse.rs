// src/parse.rs

//! Parsing collaborator: tap stdout in, portions out.
//!
//! The supervisor only depends on [`StreamParser`]. [`JsonLinesParser`] is
//! the default, which decodes one tagged JSON message per line and hands it
//! to the [`PortionConsumer`].

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

use crate::errors::{DriverError, Result};
use crate::provision::BoxFuture;
use crate::task_log::TaskLogger;

/// Boxed tap stdout.
pub type TapOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A decoded unit of tap output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Portion {
    Schema {
        stream: String,
        schema: Value,
        #[serde(default)]
        key_properties: Vec<String>,
    },
    Record {
        stream: String,
        record: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },
    State {
        value: Value,
    },
    ActivateVersion {
        stream: String,
        version: u64,
    },
}

/// Receives every decoded portion of a run.
pub trait PortionConsumer: Send + Sync {
    fn consume(&self, portion: Portion) -> Result<()>;
}

pub trait StreamParser: Send + Sync {
    /// Consume `output` until it closes, feeding `consumer`.
    ///
    /// An error means the stream can no longer be trusted; the caller is
    /// expected to stop the tap.
    fn parse<'a>(
        &'a self,
        output: TapOutput,
        consumer: &'a dyn PortionConsumer,
        logger: &'a dyn TaskLogger,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Line-delimited JSON parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesParser;

impl StreamParser for JsonLinesParser {
    fn parse<'a>(
        &'a self,
        output: TapOutput,
        consumer: &'a dyn PortionConsumer,
        logger: &'a dyn TaskLogger,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut lines = BufReader::new(output).lines();
            let mut line_no = 0usize;
            let mut portions = 0usize;

            while let Some(line) = lines.next_line().await? {
                line_no += 1;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let portion: Portion = serde_json::from_str(line)
                    .map_err(|e| DriverError::Parse(format!("line {line_no}: {e}")))?;
                trace!(line_no, "decoded portion");

                consumer.consume(portion).map_err(|e| {
                    DriverError::Parse(format!("line {line_no}: consumer rejected portion: {e}"))
                })?;
                portions += 1;
            }

            logger.info(&format!("tap output closed after {portions} portions"));
            Ok(())
        })
    }
}

/// Writes each portion to stdout as one JSON line.
#[derive(Debug, Default)]
pub struct StdoutConsumer;

impl PortionConsumer for StdoutConsumer {
    fn consume(&self, portion: Portion) -> Result<()> {
        let line = serde_json::to_string(&portion)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }
}
