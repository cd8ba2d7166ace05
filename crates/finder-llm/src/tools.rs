//! Tool definition types for LLM tool use

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function-calling tool definition sent to the provider
///
/// Describes a tool the LLM can ask the caller to run, including its name,
/// description, and input schema in JSON Schema format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the tool in the registry)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON schema for the tool's input parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Tools executed by the provider itself rather than by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    /// Grounding with Google Search
    GoogleSearch,
}

/// Helpers to build JSON schemas for tools
pub mod schema {
    use serde_json::{Value, json};

    /// Create a JSON schema for an object with properties
    ///
    /// # Example
    ///
    /// ```
    /// use finder_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "papers": schema::array("Paper results", schema::string("One paper")) }),
    ///     vec!["papers"],
    /// );
    /// assert_eq!(schema["required"][0], "papers");
    /// ```
    pub fn object(properties: Value, required: Vec<&str>) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// String property schema
    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    /// Array property schema
    pub fn array(description: &str, items: Value) -> Value {
        json!({
            "type": "array",
            "description": description,
            "items": items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_creation() {
        let schema = schema::object(
            json!({
                "request": schema::string("Topic to search for"),
            }),
            vec!["request"],
        );

        let tool = ToolDefinition::new("google_search_agent", "Searches", schema.clone());
        assert_eq!(tool.name, "google_search_agent");
        assert_eq!(tool.input_schema, schema);
    }

    #[test]
    fn test_array_schema() {
        let papers = schema::array("papers", schema::string("paper"));
        assert_eq!(papers["type"], "array");
        assert_eq!(papers["items"]["type"], "string");
    }
}
