//! CLI-specific functionality for speechrelay
//!
//! This module contains all CLI-related code including argument parsing,
//! configuration discovery and the simulated bench driver.

pub mod args;
pub mod bench;
pub mod config;

pub use args::{Args, BenchConfig, ExecutionMode, InitConfig};
pub use bench::{BenchSummary, run_bench};
pub use config::ConfigDiscovery;
