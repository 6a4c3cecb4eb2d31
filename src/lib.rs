//! refpilot command-line front end.
//!
//! Exposes the configuration and the browser-facing command bodies for integration testing.

pub mod cli;
pub mod config;
pub mod pilot;

pub use config::{AppConfig, LoadedConfig};
