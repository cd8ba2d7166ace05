//! Deterministic orchestration: search, then count, then respond
//!
//! The [`Orchestrator`] drives one request through three stages:
//!
//! 1. **Dispatch** hands the topic to the search tool and validates that the
//!    answer is a list of strings.
//! 2. **Count** passes the results to the counting tool.
//! 3. **Respond** pairs results and count into a [`CountedResult`].
//!
//! Any failure while dispatching is fatal: no partial result is produced.

use async_trait::async_trait;
use finder_core::context::keys;
use finder_core::{Agent, Context, Error, Result};
use finder_tools::{COUNT_PAPERS_TOOL, Tool, ToolRegistry};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::agents::search::SEARCH_AGENT_NAME;

/// Registered name of the orchestrating agent
pub const ORCHESTRATOR_NAME: &str = "research_paper_finder_agent";

/// Stage of a single orchestrated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the search delegate
    Dispatch,
    /// Counting the returned results
    Count,
    /// Building the final answer
    Respond,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatch => "dispatch",
            Self::Count => "count",
            Self::Respond => "respond",
        };
        f.write_str(name)
    }
}

/// Search results paired with their count
///
/// `count` always equals `results.len()`; the only constructors check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCountedResult")]
pub struct CountedResult {
    results: Vec<String>,
    count: usize,
}

#[derive(Deserialize)]
struct RawCountedResult {
    results: Vec<String>,
    count: usize,
}

impl TryFrom<RawCountedResult> for CountedResult {
    type Error = Error;

    fn try_from(raw: RawCountedResult) -> Result<Self> {
        Self::new(raw.results, raw.count)
    }
}

impl CountedResult {
    /// Pair results with a count, rejecting a count that does not match
    pub fn new(results: Vec<String>, count: usize) -> Result<Self> {
        if count != results.len() {
            return Err(Error::MalformedResults(format!(
                "count {count} does not match {} results",
                results.len()
            )));
        }
        Ok(Self { results, count })
    }

    /// Build from results alone
    pub fn from_results(results: Vec<String>) -> Self {
        let count = results.len();
        Self { results, count }
    }

    /// The search results, in the order the delegate returned them
    pub fn results(&self) -> &[String] {
        &self.results
    }

    /// Number of results
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Runs search and count as one sequential chain per topic
pub struct Orchestrator {
    search: Arc<dyn Tool>,
    counter: Arc<dyn Tool>,
    name: String,
}

impl Orchestrator {
    /// Create a builder
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Build from the search and counting tools of a registry
    pub fn from_registry(registry: &ToolRegistry) -> Result<Self> {
        let search = registry
            .get(SEARCH_AGENT_NAME)
            .ok_or_else(|| Error::ToolNotFound(SEARCH_AGENT_NAME.to_string()))?;
        let counter = registry
            .get(COUNT_PAPERS_TOOL)
            .ok_or_else(|| Error::ToolNotFound(COUNT_PAPERS_TOOL.to_string()))?;

        Self::builder().search(search).counter(counter).build()
    }

    /// Find and count papers on `topic`
    #[instrument(skip(self), fields(agent = %self.name))]
    pub async fn run(&self, topic: &str) -> Result<CountedResult> {
        info!(stage = %Stage::Dispatch, "Dispatching to search delegate");
        let raw = self
            .search
            .execute(json!({ "request": topic }))
            .await
            .map_err(|e| match e {
                Error::Delegation { .. } => e,
                other => Error::delegation(self.search.name(), other),
            })?;
        let results =
            Self::parse_results(raw).map_err(|e| Error::delegation(self.search.name(), e))?;

        info!(stage = %Stage::Count, results = results.len(), "Counting results");
        let answer = self.counter.execute(json!({ "papers": &results })).await?;
        let count = answer
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::MalformedResults(format!("counter returned a non-count value: {answer}"))
            })?;

        info!(stage = %Stage::Respond, count, "Responding");
        CountedResult::new(results, count).inspect_err(|e| {
            warn!(error = %e, "Counter disagrees with the result list");
        })
    }

    /// Run several topics concurrently, each through its own chain
    ///
    /// Outcomes are returned in input order; one failure does not affect the
    /// other topics.
    pub async fn run_batch(&self, topics: &[String]) -> Vec<Result<CountedResult>> {
        join_all(topics.iter().map(|topic| self.run(topic))).await
    }

    fn parse_results(value: Value) -> Result<Vec<String>> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(Error::MalformedResults(format!(
                    "expected a list of strings, got {other}"
                )));
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(s) => Ok(s),
                other => Err(Error::MalformedResults(format!(
                    "result {index} is not a string: {other}"
                ))),
            })
            .collect()
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.name)
            .field("search", &self.search.name())
            .field("counter", &self.counter.name())
            .finish()
    }
}

#[async_trait]
impl Agent for Orchestrator {
    async fn process(&self, input: String, context: &mut Context) -> Result<String> {
        let result = self.run(&input).await?;
        context.insert(keys::RESULT_COUNT, json!(result.count()));
        serde_json::to_string(&result)
            .map_err(|e| Error::ProcessingFailed(format!("Failed to encode result: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Finds research papers on a topic and counts them"
    }
}

/// Builder for Orchestrator
pub struct OrchestratorBuilder {
    search: Option<Arc<dyn Tool>>,
    counter: Option<Arc<dyn Tool>>,
    name: String,
}

impl OrchestratorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            search: None,
            counter: None,
            name: ORCHESTRATOR_NAME.to_string(),
        }
    }

    /// Set the search delegate
    pub fn search(mut self, tool: Arc<dyn Tool>) -> Self {
        self.search = Some(tool);
        self
    }

    /// Set the counter
    pub fn counter(mut self, tool: Arc<dyn Tool>) -> Self {
        self.counter = Some(tool);
        self
    }

    /// Set the agent name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        let search = self
            .search
            .ok_or_else(|| Error::InitializationFailed("Search tool not set".to_string()))?;
        let counter = self
            .counter
            .ok_or_else(|| Error::InitializationFailed("Counter tool not set".to_string()))?;

        Ok(Orchestrator {
            search,
            counter,
            name: self.name,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finder_tools::CountPapersTool;
    use mockall::mock;
    use tokio_test::{assert_err, assert_ok};

    mock! {
        pub SearchTool {}

        #[async_trait]
        impl Tool for SearchTool {
            async fn execute(&self, params: Value) -> Result<Value>;
            fn name(&self) -> &str;
            fn description(&self) -> &str;
            fn input_schema(&self) -> Value;
        }
    }

    fn search_returning(answer: Value) -> MockSearchTool {
        let mut tool = MockSearchTool::new();
        tool.expect_name()
            .return_const(SEARCH_AGENT_NAME.to_string());
        tool.expect_execute()
            .times(1)
            .returning(move |_| Ok(answer.clone()));
        tool
    }

    fn orchestrator(search: MockSearchTool) -> Orchestrator {
        Orchestrator::builder()
            .search(Arc::new(search))
            .counter(Arc::new(CountPapersTool))
            .build()
            .unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_counted_result_invariant() {
        let result = CountedResult::from_results(strings(&["Paper A", "Paper B"]));
        assert_eq!(result.count(), result.results().len());

        let err = assert_err!(CountedResult::new(strings(&["Paper A"]), 2));
        assert!(matches!(err, Error::MalformedResults(_)));
    }

    #[test]
    fn test_counted_result_json() {
        let result = CountedResult::from_results(strings(&["Paper A"]));
        let encoded = serde_json::to_value(&result).unwrap();
        assert_eq!(encoded, json!({ "results": ["Paper A"], "count": 1 }));

        let decoded: CountedResult = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, result);

        let inconsistent = json!({ "results": ["Paper A"], "count": 5 });
        assert!(serde_json::from_value::<CountedResult>(inconsistent).is_err());
    }

    #[tokio::test]
    async fn test_run_sends_topic_as_request() {
        let mut search = MockSearchTool::new();
        search
            .expect_name()
            .return_const(SEARCH_AGENT_NAME.to_string());
        search
            .expect_execute()
            .withf(|params| params == &json!({ "request": "llm agents" }))
            .times(1)
            .returning(|_| Ok(json!(["Paper A", "Paper B", "Paper C"])));

        let result = assert_ok!(orchestrator(search).run("llm agents").await);
        assert_eq!(result.results(), strings(&["Paper A", "Paper B", "Paper C"]));
        assert_eq!(result.count(), 3);
    }

    #[tokio::test]
    async fn test_empty_results_count_zero() {
        let result = assert_ok!(orchestrator(search_returning(json!([]))).run("").await);
        assert!(result.results().is_empty());
        assert_eq!(result.count(), 0);
    }

    #[tokio::test]
    async fn test_search_failure_is_fatal() {
        let mut search = MockSearchTool::new();
        search
            .expect_name()
            .return_const(SEARCH_AGENT_NAME.to_string());
        search
            .expect_execute()
            .returning(|_| Err(Error::ProcessingFailed("HTTP 503".to_string())));

        let err = assert_err!(orchestrator(search).run("topic").await);
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Delegation { ref agent, .. } if agent == SEARCH_AGENT_NAME));
    }

    #[tokio::test]
    async fn test_malformed_results_are_fatal() {
        for answer in [json!("Paper A"), json!(["Paper A", 42]), json!({ "papers": [] })] {
            let err = assert_err!(orchestrator(search_returning(answer)).run("topic").await);
            assert!(matches!(err, Error::Delegation { .. }));
            assert!(err.to_string().contains(SEARCH_AGENT_NAME));
        }
    }

    #[tokio::test]
    async fn test_lying_counter_is_rejected() {
        let mut counter = MockSearchTool::new();
        counter.expect_execute().returning(|_| Ok(json!(7)));
        let orchestrator = Orchestrator::builder()
            .search(Arc::new(search_returning(json!(["Paper A"]))))
            .counter(Arc::new(counter))
            .build()
            .unwrap();

        let err = assert_err!(orchestrator.run("topic").await);
        assert!(matches!(err, Error::MalformedResults(_)));
    }

    #[tokio::test]
    async fn test_process_writes_json_and_context() {
        let orchestrator = orchestrator(search_returning(json!(["Paper A", "Paper B"])));
        let mut context = Context::new();

        let output = assert_ok!(orchestrator.process("topic".to_string(), &mut context).await);

        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(context.result_count(), Some(2));
        assert_eq!(orchestrator.name(), ORCHESTRATOR_NAME);
    }

    #[tokio::test]
    async fn test_run_batch_keeps_order_and_isolates_failures() {
        let mut search = MockSearchTool::new();
        search
            .expect_name()
            .return_const(SEARCH_AGENT_NAME.to_string());
        search.expect_execute().times(3).returning(|params| {
            match params["request"].as_str() {
                Some("broken") => Err(Error::delegation(SEARCH_AGENT_NAME, "HTTP 401")),
                Some(topic) => Ok(json!([format!("{topic} paper")])),
                None => Ok(json!([])),
            }
        });
        let orchestrator = orchestrator(search);

        let outcomes = orchestrator
            .run_batch(&strings(&["rust", "broken", "wasm"]))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].as_ref().unwrap().results(), strings(&["rust paper"]));
        assert!(outcomes[1].is_err());
        assert_eq!(outcomes[2].as_ref().unwrap().count(), 1);
    }

    #[test]
    fn test_builder_requires_tools() {
        let err = assert_err!(Orchestrator::builder().build());
        assert!(matches!(err, Error::InitializationFailed(_)));
    }

    #[test]
    fn test_from_registry_requires_search() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CountPapersTool));
        let err = assert_err!(Orchestrator::from_registry(&registry));
        assert!(matches!(err, Error::ToolNotFound(ref name) if name == SEARCH_AGENT_NAME));
    }

    #[test]
    fn test_debug_names_tools() {
        let mut search = MockSearchTool::new();
        search
            .expect_name()
            .return_const(SEARCH_AGENT_NAME.to_string());
        let orchestrator = orchestrator(search);

        let debug = format!("{orchestrator:?}");

        assert!(debug.contains(ORCHESTRATOR_NAME));
        assert!(debug.contains(SEARCH_AGENT_NAME));
        assert!(debug.contains(COUNT_PAPERS_TOOL));
    }
}
