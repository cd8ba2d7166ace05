//! Runtime wiring for the paper finder
//!
//! The [`FinderRuntime`] owns the shared resources (retrying LLM provider,
//! tool registry) and exposes the two ways of answering a topic: the
//! deterministic [`Orchestrator`] and the LLM-driven root agent.

use finder_core::{Agent, Context, Error, Result};
use finder_llm::providers::{GeminiConfig, GeminiProvider};
use finder_llm::{LLMProvider, RetryPolicy, RetryingProvider};
use finder_tools::{AgentTool, CountPapersTool, ToolRegistry};
use finder_utils::Config;
use finder_utils::config::{API_KEY_ENV, DEFAULT_MODEL};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agents::{SearchAgent, SearchConfig, ToolAgent};
use crate::executor::{AgentExecutor, ExecutorConfig};
use crate::orchestrator::{CountedResult, ORCHESTRATOR_NAME, Orchestrator};

/// System instruction of the LLM-driven root agent
pub const ROOT_INSTRUCTION: &str = "Your task is to find research papers and count them.
You MUST ALWAYS follow these steps:
1) Find research papers on the user provided topic using the 'google_search_agent'.
2) Then, pass the papers to 'count_papers' tool to count the number of papers returned.
3) Return both the list of research papers and the total number of papers.";

/// Runtime holding the provider, the tools and both agents
pub struct FinderRuntime {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    orchestrator: Arc<Orchestrator>,
    root_agent: ToolAgent,
}

impl fmt::Debug for FinderRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderRuntime")
            .field("provider", &self.provider.name())
            .field("orchestrator", &self.orchestrator)
            .field("root_agent", &self.root_agent)
            .finish_non_exhaustive()
    }
}

impl FinderRuntime {
    /// Create a new runtime builder
    pub fn builder() -> FinderRuntimeBuilder {
        FinderRuntimeBuilder::new()
    }

    /// Build a runtime talking to Gemini, configured from `config`
    ///
    /// A missing API key is not an error here: it is logged, and every model
    /// call then fails authentication.
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;

        if !config.has_api_key() {
            warn!(
                "{} is not set; requests will fail authentication",
                API_KEY_ENV
            );
        }

        let provider = GeminiProvider::with_config(GeminiConfig::from_config(config))
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;

        Self::builder()
            .provider(Arc::new(provider))
            .retry_policy(RetryPolicy::from(&config.retry))
            .model(config.model.clone())
            .build()
    }

    /// The retrying provider shared by every agent
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Tools available to the root agent
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// The deterministic orchestrator
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// The LLM-driven root agent
    pub fn root_agent(&self) -> &ToolAgent {
        &self.root_agent
    }

    /// Find and count papers on one topic
    pub async fn find(&self, topic: &str) -> Result<CountedResult> {
        self.orchestrator.run(topic).await
    }

    /// Find and count papers on several topics concurrently
    pub async fn find_many(&self, topics: &[String]) -> Vec<Result<CountedResult>> {
        self.orchestrator.run_batch(topics).await
    }

    /// Let the root agent answer a topic in free text
    pub async fn ask(&self, topic: &str) -> Result<String> {
        let mut context = Context::new().with_topic(topic);
        self.root_agent.process(topic.to_string(), &mut context).await
    }
}

/// Builder for FinderRuntime
pub struct FinderRuntimeBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    retry_policy: RetryPolicy,
    model: String,
    max_iterations: usize,
}

impl FinderRuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self {
            provider: None,
            retry_policy: RetryPolicy::default(),
            model: DEFAULT_MODEL.to_string(),
            max_iterations: ExecutorConfig::default().max_iterations,
        }
    }

    /// Set the underlying (non-retrying) LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the retry policy applied to every model call
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the model used by both agents
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the iteration limit of the root agent
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Build the runtime
    pub fn build(self) -> Result<FinderRuntime> {
        let inner = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;
        let provider: Arc<dyn LLMProvider> =
            Arc::new(RetryingProvider::new(inner, Arc::new(self.retry_policy)));

        let search_agent = SearchAgent::new(
            provider.clone(),
            SearchConfig {
                model: self.model.clone(),
                ..SearchConfig::default()
            },
        );

        let tool_registry = Arc::new(ToolRegistry::new());
        tool_registry.register(Arc::new(AgentTool::new(Arc::new(search_agent))));
        tool_registry.register(Arc::new(CountPapersTool));

        let orchestrator = Arc::new(Orchestrator::from_registry(&tool_registry)?);

        let executor = AgentExecutor::new(
            provider.clone(),
            tool_registry.clone(),
            ExecutorConfig {
                max_iterations: self.max_iterations,
                model: self.model.clone(),
                system_prompt: Some(ROOT_INSTRUCTION.to_string()),
                ..ExecutorConfig::default()
            },
        );
        let root_agent = ToolAgent::new(executor, ORCHESTRATOR_NAME)
            .with_description("Finds research papers on a topic and counts them");

        info!(
            model = %self.model,
            tools = ?tool_registry.names(),
            "Finder runtime ready"
        );

        Ok(FinderRuntime {
            provider,
            tool_registry,
            orchestrator,
            root_agent,
        })
    }
}

impl Default for FinderRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finder_utils::RetryOptions;
    use tokio_test::assert_err;

    #[test]
    fn test_builder_defaults() {
        let builder = FinderRuntimeBuilder::new();
        assert_eq!(builder.model, DEFAULT_MODEL);
        assert_eq!(builder.max_iterations, 10);
        assert_eq!(builder.retry_policy, RetryPolicy::default());
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = assert_err!(FinderRuntime::builder().build());
        assert!(matches!(err, Error::InitializationFailed(_)));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = Config::from_vars(|_| None);
        let runtime = FinderRuntime::from_config(&config).unwrap();

        assert_eq!(runtime.provider().name(), "gemini");
        assert_eq!(
            runtime.tools().names(),
            vec!["count_papers".to_string(), "google_search_agent".to_string()]
        );
        assert_eq!(runtime.root_agent().name(), ORCHESTRATOR_NAME);
        assert_eq!(
            runtime.root_agent().executor().config().system_prompt.as_deref(),
            Some(ROOT_INSTRUCTION)
        );
    }

    #[test]
    fn test_from_config_rejects_invalid_retry() {
        let config = Config::from_vars(|_| None).with_retry(RetryOptions {
            attempts: 0,
            ..RetryOptions::default()
        });
        let err = assert_err!(FinderRuntime::from_config(&config));
        assert!(matches!(err, Error::InitializationFailed(_)));
    }

    #[test]
    fn test_debug_shows_agents() {
        let config = Config::from_vars(|_| None);
        let runtime = FinderRuntime::from_config(&config).unwrap();

        let debug = format!("{runtime:?}");

        assert!(debug.starts_with("FinderRuntime"));
        assert!(debug.contains("\"gemini\""));
        assert!(debug.contains(ORCHESTRATOR_NAME));
        assert!(debug.contains("google_search_agent"));
    }
}
