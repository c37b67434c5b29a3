//! # Core Module
//!
//! Configuration shared by the analytics client, its strategies and the CLI.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod config;

pub use config::{Config, StrategyKind};
