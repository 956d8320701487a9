//! Configuration module
//!
//! Settings for the `airtable` binary, read from a TOML file.

pub mod config;

pub use config::{ApiConfig, Config, DisplayConfig, RetryConfig};
