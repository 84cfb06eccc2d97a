// src/config/validate.rs

use crate::config::model::{DriverFile, RawDriverFile, SourceConfig, TapConfig};
use crate::errors::{DriverError, Result};

impl TryFrom<RawDriverFile> for DriverFile {
    type Error = DriverError;

    fn try_from(raw: RawDriverFile) -> std::result::Result<Self, Self::Error> {
        validate_driver_section(&raw)?;
        let source = SourceConfig::from(raw.source);
        source.validate()?;
        Ok(DriverFile {
            driver: raw.driver,
            source,
        })
    }
}

fn validate_driver_section(raw: &RawDriverFile) -> Result<()> {
    if raw.driver.install_root.as_os_str().is_empty() {
        return Err(DriverError::Config(
            "[driver].install_root must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source_id.is_empty() {
            return Err(DriverError::Config("source id is required".to_string()));
        }
        self.tap.validate()
    }
}

impl TapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tap.is_empty() {
            return Err(DriverError::Config("tap is required".to_string()));
        }

        if self.config.as_ref().is_none_or(|v| v.is_null()) {
            return Err(DriverError::Config(format!(
                "config is required for tap '{}'",
                self.tap
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tap(name: &str, config: Option<serde_json::Value>) -> TapConfig {
        TapConfig {
            tap: name.to_string(),
            config,
            ..TapConfig::default()
        }
    }

    #[test]
    fn tap_name_is_required() {
        let err = tap("", Some(json!({}))).validate().unwrap_err();
        assert!(matches!(err, DriverError::Config(ref m) if m.contains("tap is required")));
    }

    #[test]
    fn config_is_required() {
        for config in [None, Some(serde_json::Value::Null)] {
            let err = tap("tap-a", config).validate().unwrap_err();
            assert!(matches!(err, DriverError::Config(ref m) if m.contains("config is required")));
        }
    }

    #[test]
    fn source_id_is_required() {
        let src = SourceConfig::new("", tap("tap-a", Some(json!({}))));
        assert!(src.validate().is_err());
    }
}
