#![allow(dead_code)]

use serde_json::Value;
use tapdriver::config::{SourceConfig, TapConfig};

/// Builder for `TapConfig` to simplify test setup.
pub struct TapConfigBuilder {
    tap: TapConfig,
}

impl TapConfigBuilder {
    pub fn new(tap: &str) -> Self {
        Self {
            tap: TapConfig {
                tap: tap.to_string(),
                ..TapConfig::default()
            },
        }
    }

    pub fn config(mut self, value: Value) -> Self {
        self.tap.config = Some(value);
        self
    }

    pub fn catalog(mut self, value: Value) -> Self {
        self.tap.catalog = Some(value);
        self
    }

    pub fn properties(mut self, value: Value) -> Self {
        self.tap.properties = Some(value);
        self
    }

    pub fn initial_state(mut self, value: Value) -> Self {
        self.tap.initial_state = Some(value);
        self
    }

    pub fn build(self) -> TapConfig {
        self.tap
    }

    /// Wrap into a `SourceConfig` for `source_id`.
    pub fn for_source(self, source_id: &str) -> SourceConfig {
        SourceConfig::new(source_id, self.tap)
    }
}
