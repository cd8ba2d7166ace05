//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// Core trait that all agents must implement
///
/// Input and output are plain strings; an agent that produces structured data
/// (such as the search agent's list of papers) encodes it as JSON text.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process input and return output
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;

    /// One-line description, used when the agent is exposed as a tool
    fn description(&self) -> &str {
        ""
    }
}
