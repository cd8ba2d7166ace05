//! Agent delegation exposed as a tool

use crate::Tool;
use async_trait::async_trait;
use finder_core::{Agent, Context, Error, Result};
use finder_llm::tools::schema;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Wraps an [`Agent`] so another agent can call it like any other tool
///
/// Input: `{"request": string}`. The wrapped agent's answer is returned as
/// JSON when it parses as JSON, otherwise as a JSON string. Any failure of
/// the wrapped agent is reported as a fatal [`Error::Delegation`].
pub struct AgentTool {
    agent: Arc<dyn Agent>,
}

impl AgentTool {
    /// Wrap an agent
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    fn request_param(params: &Value) -> Result<&str> {
        match params {
            Value::String(request) => Ok(request.as_str()),
            Value::Object(map) => map.get("request").and_then(Value::as_str).ok_or_else(|| {
                Error::InvalidParameters("missing string parameter 'request'".to_string())
            }),
            other => Err(Error::InvalidParameters(format!(
                "expected an object with a 'request' field, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let request = Self::request_param(&params)?.to_string();
        info!(agent = %self.agent.name(), "Delegating to agent");

        let mut context = Context::new().with_topic(request.clone());
        let output = self
            .agent
            .process(request, &mut context)
            .await
            .map_err(|e| match e {
                Error::Delegation { .. } => e,
                other => Error::delegation(self.agent.name(), other),
            })?;

        debug!(agent = %self.agent.name(), output_len = output.len(), "Agent answered");
        Ok(serde_json::from_str(&output).unwrap_or(Value::String(output)))
    }

    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        self.agent.description()
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({ "request": schema::string("The request for the agent") }),
            vec!["request"],
        )
    }
}
