//! Google Gemini provider implementation
//!
//! Implements [`LLMProvider`] on top of the Gemini `generateContent` REST API.
//! See: https://ai.google.dev/api/generate-content
//!
//! The provider makes exactly one HTTP call per completion. Wrap it in a
//! [`RetryingProvider`](crate::RetryingProvider) to get retries.
//!
//! # Example
//!
//! ```no_run
//! use finder_llm::providers::{GeminiConfig, GeminiProvider};
//! use finder_llm::{BuiltinTool, CompletionRequest, LLMProvider, Message};
//!
//! # async fn example() -> finder_llm::Result<()> {
//! let provider = GeminiProvider::with_config(GeminiConfig::new("api-key"))?;
//!
//! let request = CompletionRequest::builder("gemini-2.5-flash-lite")
//!     .add_message(Message::user("quantum computing 2024"))
//!     .builtin_tool(BuiltinTool::GoogleSearch)
//!     .build();
//!
//! let response = provider.complete(request).await?;
//! println!("{}", response.message.full_text());
//! # Ok(())
//! # }
//! ```

use crate::{
    BuiltinTool, CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider,
    Message, MessageContent, Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use finder_utils::Config;
use finder_utils::config::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key; may be empty, in which case every call fails authentication
    pub api_key: String,

    /// Base URL of the REST API
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Create a config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Derive the provider config from the process configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.api_key_or_empty().to_string(),
            api_base: config.api_base.clone(),
            timeout_secs: config.request_timeout_secs,
        }
    }

    /// Set a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base).map_err(|e| {
            LLMError::ConfigurationError(format!("invalid API base '{}': {e}", self.api_base))
        })?;
        Ok(())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = self.endpoint(&request.model);
        let body = build_request(request);
        debug!(
            contents = body.contents.len(),
            tools = body.tools.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text));
        }

        let gemini_response: GenerateContentResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let completion = parse_response(gemini_response)?;
        debug!(
            stop_reason = ?completion.stop_reason,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "Received response"
        );
        Ok(completion)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// Gemini wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<FunctionDeclaration>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request(request: CompletionRequest) -> GenerateContentRequest {
    let mut tools = Vec::new();
    for builtin in &request.builtin_tools {
        match builtin {
            BuiltinTool::GoogleSearch => tools.push(GeminiTool {
                google_search: Some(json!({})),
                ..GeminiTool::default()
            }),
        }
    }
    if let Some(definitions) = request.tools.filter(|t| !t.is_empty()) {
        tools.push(GeminiTool {
            function_declarations: Some(definitions.into_iter().map(declaration).collect()),
            ..GeminiTool::default()
        });
    }

    GenerateContentRequest {
        contents: build_contents(request.messages),
        system_instruction: request.system.map(|system| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system)],
        }),
        tools,
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
    }
}

fn declaration(tool: ToolDefinition) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name,
        description: tool.description,
        parameters: tool.input_schema,
    }
}

/// Convert the conversation into Gemini contents
///
/// Gemini identifies function responses by function name, not by call ID, so
/// the name of every tool use is remembered and looked up for its result.
fn build_contents(messages: Vec<Message>) -> Vec<GeminiContent> {
    let mut call_names: HashMap<String, String> = HashMap::new();

    messages
        .into_iter()
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let parts = match message.content {
                None => Vec::new(),
                Some(MessageContent::Text(text)) => vec![GeminiPart::text(text)],
                Some(MessageContent::Blocks(blocks)) => blocks
                    .into_iter()
                    .map(|block| block_to_part(block, &mut call_names))
                    .collect(),
            };
            GeminiContent {
                role: Some(role.to_string()),
                parts,
            }
        })
        .collect()
}

fn block_to_part(block: ContentBlock, call_names: &mut HashMap<String, String>) -> GeminiPart {
    match block {
        ContentBlock::Text { text } => GeminiPart::text(text),
        ContentBlock::ToolUse { id, name, input } => {
            call_names.insert(id, name.clone());
            GeminiPart {
                function_call: Some(FunctionCall {
                    id: None,
                    name,
                    args: input,
                }),
                ..GeminiPart::default()
            }
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let name = call_names
                .get(&tool_use_id)
                .cloned()
                .unwrap_or(tool_use_id);
            let response = if is_error.unwrap_or(false) {
                json!({ "error": content })
            } else {
                let value = serde_json::from_str(&content).unwrap_or(Value::String(content));
                json!({ "result": value })
            };
            GeminiPart {
                function_response: Some(FunctionResponse { name, response }),
                ..GeminiPart::default()
            }
        }
    }
}

fn parse_response(response: GenerateContentResponse) -> Result<CompletionResponse> {
    let usage = response
        .usage_metadata
        .map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            debug!(block_reason = %reason, "Prompt blocked");
            return Ok(CompletionResponse {
                message: Message::assistant_blocks(Vec::new()),
                stop_reason: StopReason::Blocked,
                usage,
            });
        }
        return Err(LLMError::UnexpectedResponse(
            "response contained no candidates".to_string(),
        ));
    };

    let mut blocks = Vec::new();
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    for (index, part) in parts.into_iter().enumerate() {
        if part.thought.unwrap_or(false) {
            continue;
        }
        if let Some(call) = part.function_call {
            blocks.push(ContentBlock::ToolUse {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.name,
                input: call.args,
            });
        } else if let Some(text) = part.text {
            blocks.push(ContentBlock::Text { text });
        }
    }

    let has_tool_use = blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
    let stop_reason = if has_tool_use {
        StopReason::ToolUse
    } else {
        match candidate.finish_reason.as_deref() {
            Some("STOP") | None => StopReason::EndTurn,
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
                StopReason::Blocked
            }
            Some(other) => {
                debug!("Unknown finish reason: {}", other);
                StopReason::EndTurn
            }
        }
    };

    Ok(CompletionResponse {
        message: Message::assistant_blocks(blocks),
        stop_reason,
        usage,
    })
}
