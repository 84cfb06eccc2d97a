// src/config/mod.rs

//! Configuration for a tap driver.
//!
//! - `model.rs`: serde data model for the driver file and tap inputs.
//! - `loader.rs`: read a TOML driver file from disk.
//! - `validate.rs`: required-field checks, run at load and at driver
//!   construction.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{DriverFile, DriverSection, RawDriverFile, SourceConfig, SourceSection, TapConfig};
