// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`supervisor`] spawns a tap in sync mode, streams stdout through the
//!   parser and stderr into the process log, and serves kill requests while
//!   waiting for the process.
//! - [`probe`] runs a tap in discovery mode through the provisioner with
//!   both streams captured in memory.

pub mod probe;
pub mod supervisor;

pub use probe::run_discover;
pub use supervisor::{run_sync, RunSinks, SyncInvocation};
