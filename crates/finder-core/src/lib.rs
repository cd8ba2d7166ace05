//! Core abstractions for paper-finder
//!
//! This crate defines the fundamental traits and types shared by the other
//! paper-finder crates.

pub mod agent;
pub mod context;
pub mod error;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
