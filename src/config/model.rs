// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Driver file as read from TOML.
///
/// ```toml
/// [driver]
/// install_root = "/var/lib/tapdriver"
/// process_log = "/var/log/tapdriver/taps.log"
///
/// [source]
/// id = "orders"
/// tap = "tap-postgres"
/// config = { host = "db", port = 5432 }
/// catalog = "/etc/tapdriver/catalog.json"
/// initial_state = '{"bookmarks":{}}'
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawDriverFile {
    pub driver: DriverSection,
    pub source: SourceSection,
}

/// Validated driver file. Build through `TryFrom<RawDriverFile>`.
#[derive(Debug, Clone)]
pub struct DriverFile {
    pub driver: DriverSection,
    pub source: SourceConfig,
}

/// `[driver]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSection {
    /// Where taps are installed and per-source files are written.
    pub install_root: PathBuf,

    /// Append tap stderr here; stderr of this process if unset.
    #[serde(default)]
    pub process_log: Option<PathBuf>,
}

/// `[source]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub tap: String,

    #[serde(default)]
    pub config: Option<Value>,

    #[serde(default)]
    pub catalog: Option<Value>,

    #[serde(default)]
    pub properties: Option<Value>,

    #[serde(default)]
    pub initial_state: Option<Value>,
}

impl From<SourceSection> for SourceConfig {
    fn from(section: SourceSection) -> Self {
        SourceConfig {
            source_id: section.id,
            tap: TapConfig {
                tap: section.tap,
                config: section.config,
                catalog: section.catalog,
                properties: section.properties,
                initial_state: section.initial_state,
            },
        }
    }
}

/// One configured source driven by a tap.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub source_id: String,
    pub tap: TapConfig,
}

impl SourceConfig {
    pub fn new(source_id: impl Into<String>, tap: TapConfig) -> Self {
        Self {
            source_id: source_id.into(),
            tap,
        }
    }
}

/// Tap name plus its four file inputs.
///
/// Each input is either a JSON mapping, inline JSON text, or a path to an
/// existing JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TapConfig {
    #[serde(default)]
    pub tap: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Value>,
}
