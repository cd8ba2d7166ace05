//! Concrete agent implementations
//!
//! - SearchAgent: one grounded Google Search call, answer normalised to a list
//! - ToolAgent: LLM loop with tool execution (the root agent)

pub mod search;
pub mod tool;

pub use search::{SEARCH_AGENT_NAME, SearchAgent, SearchConfig, parse_search_results};
pub use tool::ToolAgent;
