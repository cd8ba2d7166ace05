//! Tool agent implementation (wraps AgentExecutor)

use crate::executor::AgentExecutor;
use async_trait::async_trait;
use finder_core::{Agent, Context, Result};

/// An agent that answers through the LLM loop with tool execution
///
/// This is the LLM-driven root agent: the model decides when to call the
/// search agent and the counter, and its final text is the answer.
#[derive(Debug)]
pub struct ToolAgent {
    executor: AgentExecutor,
    name: String,
    description: String,
}

impl ToolAgent {
    /// Create a new tool agent
    pub fn new(executor: AgentExecutor, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
            description: String::new(),
        }
    }

    /// Set the description advertised to callers
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &AgentExecutor {
        &self.executor
    }
}

#[async_trait]
impl Agent for ToolAgent {
    async fn process(&self, input: String, _context: &mut Context) -> Result<String> {
        self.executor.run(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}
