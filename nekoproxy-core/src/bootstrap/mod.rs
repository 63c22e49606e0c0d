//! Bootstrap helpers for starting the relay
//!
//! Configuration discovery, loading and validation happen here, before
//! logging is initialized.

pub mod config;

pub use config::load_config;
