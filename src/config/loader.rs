// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{DriverFile, RawDriverFile};
use crate::errors::Result;

/// Read and deserialize a driver file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDriverFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawDriverFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Read, deserialize and validate a driver file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<DriverFile> {
    let raw = load_from_path(path)?;
    DriverFile::try_from(raw)
}
