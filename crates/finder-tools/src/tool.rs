//! Tool trait definition

use async_trait::async_trait;
use finder_core::Result;
use finder_llm::ToolDefinition;
use serde_json::Value;

/// Trait for tools that agents can execute
///
/// Each tool provides a name, a description and a JSON schema for its input.
/// `execute` may fail; fatal failures (see [`finder_core::Error::is_fatal`])
/// must not be turned into results by the caller.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with parameters matching `input_schema`
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Get the tool's name
    ///
    /// Must be unique within a ToolRegistry
    fn name(&self) -> &str;

    /// Get the tool's description
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    fn input_schema(&self) -> Value;

    /// Function-calling declaration for this tool
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}
