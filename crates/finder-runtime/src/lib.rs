//! Agent runtime for paper-finder
//!
//! This crate wires the pieces together: the [`SearchAgent`] that asks Gemini
//! with Google Search grounding, the deterministic [`Orchestrator`] that
//! counts its results, the [`AgentExecutor`] tool loop behind the LLM-driven
//! root agent, and the [`FinderRuntime`] that builds all of them from a
//! [`finder_utils::Config`].

pub mod agents;
pub mod executor;
pub mod orchestrator;
pub mod runtime;

// Re-export key types
pub use agents::{SEARCH_AGENT_NAME, SearchAgent, SearchConfig, ToolAgent, parse_search_results};
pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutorConfig};
pub use orchestrator::{CountedResult, ORCHESTRATOR_NAME, Orchestrator, OrchestratorBuilder, Stage};
pub use runtime::{FinderRuntime, FinderRuntimeBuilder, ROOT_INSTRUCTION};
