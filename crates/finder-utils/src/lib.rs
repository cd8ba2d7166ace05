//! Shared utilities for paper-finder
//!
//! This crate provides common functionality used across the paper-finder workspace:
//! tracing setup and the process-wide configuration (credential, model, retry options)
//! that is loaded once at startup and injected into the runtime.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, RetryOptions};
pub use logging::{LogFormat, init_tracing_with};
