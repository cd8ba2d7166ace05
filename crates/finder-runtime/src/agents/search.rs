//! Search agent: one grounded LLM call that lists papers on a topic

use async_trait::async_trait;
use finder_core::{Agent, Context, Error, Result};
use finder_llm::{BuiltinTool, CompletionRequest, LLMProvider, Message, StopReason};
use finder_utils::config::DEFAULT_MODEL;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument};

/// Registered name of the search agent
pub const SEARCH_AGENT_NAME: &str = "google_search_agent";

/// Description shown to the root agent
pub const SEARCH_AGENT_DESCRIPTION: &str = "Searches for information using Google search";

/// Instruction given to the search model
pub const SEARCH_INSTRUCTION: &str = "Use the google_search tool to find information \
on the given topic. \
Return the raw search results as a list of strings: reply with a JSON array of strings, \
one string per research paper, and nothing else.";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```")
        .expect("valid fence regex")
});

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+•]|\d+[.)])\s+").expect("valid list marker regex")
});

/// Configuration for the search agent
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Model to use
    pub model: String,

    /// System instruction
    pub instruction: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature for sampling (provider default when `None`)
    pub temperature: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instruction: SEARCH_INSTRUCTION.to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// Agent that answers a topic with a list of papers found by Google Search
///
/// The search itself runs inside the provider (grounding tool); this agent
/// only builds the request and normalises the answer into `Vec<String>`.
/// Every failure, transport or parsing, is a fatal [`Error::Delegation`].
pub struct SearchAgent {
    provider: Arc<dyn LLMProvider>,
    config: SearchConfig,
    name: String,
}

impl SearchAgent {
    /// Create a new search agent
    pub fn new(provider: Arc<dyn LLMProvider>, config: SearchConfig) -> Self {
        Self {
            provider,
            config,
            name: SEARCH_AGENT_NAME.to_string(),
        }
    }

    /// Get the agent's configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search for papers on `topic`
    ///
    /// A blank topic yields an empty list without calling the model.
    #[instrument(skip(self), fields(agent = %self.name))]
    pub async fn search(&self, topic: &str) -> Result<Vec<String>> {
        if topic.trim().is_empty() {
            debug!("Blank topic, skipping model call");
            return Ok(Vec::new());
        }

        let mut builder = CompletionRequest::builder(&self.config.model)
            .add_message(Message::user(topic))
            .system(self.config.instruction.clone())
            .max_tokens(self.config.max_tokens)
            .builtin_tool(BuiltinTool::GoogleSearch);
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }

        let response = self
            .provider
            .complete(builder.build())
            .await
            .map_err(|e| Error::delegation(&self.name, e))?;

        match response.stop_reason {
            StopReason::Blocked => {
                return Err(Error::delegation(
                    &self.name,
                    "response was blocked by the provider",
                ));
            }
            StopReason::MaxTokens => {
                return Err(Error::delegation(
                    &self.name,
                    "response was truncated at the token limit",
                ));
            }
            _ => {}
        }

        let results = parse_search_results(&response.message.full_text())
            .map_err(|e| Error::delegation(&self.name, e))?;
        info!(results = results.len(), "Search completed");
        Ok(results)
    }
}

#[async_trait]
impl Agent for SearchAgent {
    async fn process(&self, input: String, _context: &mut Context) -> Result<String> {
        let results = self.search(&input).await?;
        serde_json::to_string(&results)
            .map_err(|e| Error::ProcessingFailed(format!("Failed to encode results: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        SEARCH_AGENT_DESCRIPTION
    }
}

/// Normalise a model answer into a list of result strings
///
/// The first Markdown code fence in the answer is unwrapped, wherever it
/// starts. The body is then read as a JSON array of strings, or as the first
/// embedded `[...]` array of strings, or as a plain list with one entry per
/// line. In a plain list, bullets and numbering are removed and intro lines
/// ending in `:` are dropped. A body that is itself a JSON array holding
/// anything other than strings is malformed.
pub fn parse_search_results(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str().trim());

    if body.is_empty() {
        return Ok(Vec::new());
    }

    if body.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) {
            return string_items(items);
        }
    }

    if let Some(found) = JSON_ARRAY.find(body) {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(found.as_str()) {
            return Ok(items);
        }
    }

    Ok(body
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```") && !line.ends_with(':'))
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

fn string_items(items: Vec<Value>) -> Result<Vec<String>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(s) => Ok(s),
            other => Err(Error::MalformedResults(format!(
                "element {index} is not a string: {other}"
            ))),
        })
        .collect()
}
