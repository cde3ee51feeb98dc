//! Configuration module.
//!
//! [`SentinelConfig`] is loaded once at startup and passed by value into
//! the components that need it; there is no global config state. The
//! loading order is `SENTINEL_CONFIG` env var, then `sentinel.toml` in the
//! working directory, then built-in defaults.

pub mod defaults;
mod settings;

pub use settings::{ConfigError, SentinelConfig};
