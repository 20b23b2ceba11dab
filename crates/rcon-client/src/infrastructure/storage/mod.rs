//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the listener's TOML configuration and falls
//! back to defaults when no file exists yet, so a first run only needs the
//! password on the command line.

pub mod config;
