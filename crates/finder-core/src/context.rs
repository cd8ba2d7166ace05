//! Per-request execution context
//!
//! A `Context` lives for exactly one request. It is never shared between
//! concurrent requests, so it needs no synchronisation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known context keys
pub mod keys {
    /// Topic the request is about
    pub const TOPIC: &str = "topic";
    /// Number of papers found, written by the orchestrator
    pub const RESULT_COUNT: &str = "result_count";
}

/// Context passed to agents during execution
///
/// # Example
///
/// ```
/// use finder_core::Context;
///
/// let ctx = Context::new().with_topic("quantum computing 2024");
///
/// assert_eq!(ctx.topic(), Some("quantum computing 2024"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: HashMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.insert(keys::TOPIC, serde_json::json!(topic.into()));
        self
    }

    /// Get the topic
    pub fn topic(&self) -> Option<&str> {
        self.get(keys::TOPIC).and_then(|v| v.as_str())
    }

    /// Get the result count recorded by the orchestrator
    pub fn result_count(&self) -> Option<usize> {
        self.get(keys::RESULT_COUNT)
            .and_then(serde_json::Value::as_u64)
            .map(|n| n as usize)
    }

    /// Insert a value into the context
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Insert a typed value into the context
    ///
    /// Serializes the value to JSON before storing.
    pub fn insert_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| {
            crate::Error::ProcessingFailed(format!("Failed to serialize context value: {e}"))
        })?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Get a typed value from the context
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    crate::Error::ProcessingFailed(format!(
                        "Failed to deserialize context value: {e}"
                    ))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Get the number of entries in the context
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the context is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
