//! Agent executor for running agent loops
//!
//! The AgentExecutor implements the core agent loop pattern:
//! 1. Call LLM with conversation history and available tools
//! 2. Check stop reason
//! 3. If tool use requested, execute tools and loop back
//! 4. If completed, return final response
//!
//! Tool failures are fed back to the model so it can recover, except fatal
//! ones (see [`Error::is_fatal`]), which abort the whole run.

use finder_core::{Error, Result};
use finder_llm::{CompletionRequest, ContentBlock, LLMProvider, Message, StopReason, ToolDefinition};
use finder_tools::ToolRegistry;
use finder_utils::config::DEFAULT_MODEL;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of iterations (prevents infinite loops)
    pub max_iterations: usize,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    /// Create a builder
    pub fn builder() -> AgentExecutorBuilder {
        AgentExecutorBuilder::new()
    }

    /// Get the executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute the agent loop with a user query
    ///
    /// Returns the final text of the model once it ends its turn.
    pub async fn run(&self, user_message: String) -> Result<String> {
        self.run_with_history(user_message, Vec::new()).await
    }

    /// Execute the agent loop with conversation history
    pub async fn run_with_history(
        &self,
        user_message: String,
        history: Vec<Message>,
    ) -> Result<String> {
        let mut conversation = history;
        conversation.push(Message::user(user_message));

        let tools = self.build_tool_definitions();
        debug!(tool_count = tools.len(), "Available tools");

        for iteration in 1..=self.config.max_iterations {
            info!(
                iteration = iteration,
                max_iterations = self.config.max_iterations,
                "Agent iteration started"
            );

            let mut request_builder = CompletionRequest::builder(&self.config.model)
                .messages(conversation.clone())
                .max_tokens(self.config.max_tokens);
            if let Some(system) = &self.config.system_prompt {
                request_builder = request_builder.system(system.clone());
            }
            if let Some(temperature) = self.config.temperature {
                request_builder = request_builder.temperature(temperature);
            }
            if !tools.is_empty() {
                request_builder = request_builder.tools(tools.clone());
            }

            let response = self
                .provider
                .complete(request_builder.build())
                .await
                .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

            info!(
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "LLM response received"
            );

            conversation.push(response.message.clone());

            match response.stop_reason {
                StopReason::EndTurn | StopReason::StopSequence => {
                    let text = response.message.full_text();
                    info!(
                        iteration = iteration,
                        response_length = text.len(),
                        "Agent completed naturally"
                    );
                    return Ok(text);
                }

                StopReason::ToolUse => {
                    let tool_results = self.execute_tools(&response.message).await?;
                    if tool_results.is_empty() {
                        return Err(Error::ProcessingFailed(
                            "model requested tool use without any tool call".to_string(),
                        ));
                    }
                    conversation.extend(tool_results);
                }

                StopReason::MaxTokens => {
                    warn!("Hit max tokens in LLM response");
                    return Err(Error::ProcessingFailed(
                        "response truncated due to token limit".to_string(),
                    ));
                }

                StopReason::Blocked => {
                    warn!("LLM response was blocked");
                    return Err(Error::ProcessingFailed(
                        "response was blocked by the provider".to_string(),
                    ));
                }
            }
        }

        warn!(
            "Max iterations ({}) reached, stopping",
            self.config.max_iterations
        );
        Err(Error::ProcessingFailed(format!(
            "max iterations ({}) reached without completion",
            self.config.max_iterations
        )))
    }

    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| tool.definition())
            .collect()
    }

    /// Execute tool calls from an assistant message
    async fn execute_tools(&self, message: &Message) -> Result<Vec<Message>> {
        let mut results = Vec::new();

        for tool_use in message.tool_uses() {
            let ContentBlock::ToolUse { id, name, input } = tool_use else {
                continue;
            };

            let input_preview: String = input.to_string().chars().take(500).collect();
            info!(
                tool_name = %name,
                tool_id = %id,
                input_preview = %input_preview,
                "Executing tool"
            );

            let Some(tool) = self.tool_registry.get(name) else {
                warn!(tool_name = %name, "Model requested unknown tool");
                results.push(Message::tool_error(
                    id.clone(),
                    format!("Error: {}", Error::ToolNotFound(name.clone())),
                ));
                continue;
            };

            let start_time = Instant::now();
            match tool.execute(input.clone()).await {
                Ok(result) => {
                    let result_str = result.to_string();
                    info!(
                        tool_name = %name,
                        duration_ms = start_time.elapsed().as_millis(),
                        result_length = result_str.len(),
                        "Tool execution succeeded"
                    );
                    results.push(Message::tool_result(id.clone(), result_str));
                }
                Err(e) if e.is_fatal() => {
                    warn!(tool_name = %name, error = %e, "Tool failed fatally, aborting");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        tool_name = %name,
                        duration_ms = start_time.elapsed().as_millis(),
                        error = %e,
                        "Tool execution failed"
                    );
                    results.push(Message::tool_error(id.clone(), format!("Error: {e}")));
                }
            }
        }

        Ok(results)
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;

        Ok(AgentExecutor::new(provider, self.tool_registry, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finder_llm::{CompletionResponse, MessageContent, TokenUsage};
    use finder_tools::{CountPapersTool, Tool};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Provider that replays scripted responses and records every request
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<CompletionResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<CompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> finder_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            self.script.lock().unwrap().pop_front().ok_or_else(|| {
                finder_llm::LLMError::UnexpectedResponse("script exhausted".to_string())
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingTool {
        fatal: bool,
    }

    #[async_trait]
    impl Tool for FailingTool {
        async fn execute(&self, _params: Value) -> Result<Value> {
            if self.fatal {
                Err(Error::delegation("google_search_agent", "HTTP 503"))
            } else {
                Err(Error::InvalidParameters("bad input".to_string()))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
    }

    fn tool_call(name: &str, input: Value) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant_blocks(vec![ContentBlock::ToolUse {
                id: "call_0".to_string(),
                name: name.to_string(),
                input,
            }]),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    fn executor(provider: Arc<ScriptedProvider>, tools: Vec<Arc<dyn Tool>>) -> AgentExecutor {
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(tool);
        }
        AgentExecutor::builder()
            .provider(provider)
            .tool_registry(registry)
            .system_prompt("Count the papers.")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder() {
        let builder = AgentExecutorBuilder::new()
            .model("test-model")
            .max_iterations(5)
            .system_prompt("Test prompt");

        assert_eq!(builder.config.model, "test-model");
        assert_eq!(builder.config.max_iterations, 5);
        assert_eq!(
            builder.config.system_prompt,
            Some("Test prompt".to_string())
        );
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = assert_err!(AgentExecutorBuilder::new().build());
        assert!(matches!(err, Error::InitializationFailed(_)));
    }

    #[test]
    fn test_debug_shows_provider_and_config() {
        let executor = AgentExecutorBuilder::new()
            .provider(ScriptedProvider::new(Vec::new()))
            .build()
            .unwrap();

        let debug = format!("{executor:?}");

        assert!(debug.contains("\"scripted\""));
        assert!(debug.contains("max_iterations: 10"));
    }

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_tool_loop() {
        let provider = ScriptedProvider::new(vec![
            tool_call("count_papers", json!({ "papers": ["Paper A", "Paper B"] })),
            CompletionResponse::text("Found 2 papers."),
        ]);
        let executor = executor(provider.clone(), vec![Arc::new(CountPapersTool)]);

        let answer = assert_ok!(executor.run("llm agents".to_string()).await);
        assert_eq!(answer, "Found 2 papers.");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system.as_deref(), Some("Count the papers."));
        assert_eq!(requests[0].tools.as_ref().map(Vec::len), Some(1));

        let Some(MessageContent::Blocks(blocks)) = &requests[1].messages[2].content else {
            panic!("expected a tool result message");
        };
        assert!(matches!(
            &blocks[0],
            ContentBlock::ToolResult { tool_use_id, content, .. }
                if tool_use_id == "call_0" && content == "2"
        ));
    }

    #[tokio::test]
    async fn test_recoverable_tool_error_is_fed_back() {
        let provider = ScriptedProvider::new(vec![
            tool_call("flaky", json!({})),
            tool_call("missing", json!({})),
            CompletionResponse::text("Gave up."),
        ]);
        let executor = executor(provider.clone(), vec![Arc::new(FailingTool { fatal: false })]);

        let answer = assert_ok!(executor.run("topic".to_string()).await);
        assert_eq!(answer, "Gave up.");
        assert_eq!(provider.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_tool_error_aborts() {
        let provider = ScriptedProvider::new(vec![
            tool_call("flaky", json!({})),
            CompletionResponse::text("unreachable"),
        ]);
        let executor = executor(provider.clone(), vec![Arc::new(FailingTool { fatal: true })]);

        let err = assert_err!(executor.run("topic".to_string()).await);
        assert!(matches!(err, Error::Delegation { .. }));
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let provider = ScriptedProvider::new(
            (0..3)
                .map(|_| tool_call("count_papers", json!({ "papers": [] })))
                .collect(),
        );
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(CountPapersTool));
        let executor = AgentExecutor::builder()
            .provider(provider)
            .tool_registry(registry)
            .max_iterations(3)
            .build()
            .unwrap();

        let err = assert_err!(executor.run("topic".to_string()).await);
        assert!(err.to_string().contains("max iterations (3)"));
    }
}
