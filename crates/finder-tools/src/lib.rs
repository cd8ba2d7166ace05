//! Tool management and execution framework for paper-finder
//!
//! Everything an agent can invoke is a [`Tool`]: the local paper counter and
//! whole agents wrapped with [`AgentTool`] alike. Callers dispatch through the
//! one interface and tests substitute fakes.

pub mod agent_tool;
pub mod count;
pub mod registry;
pub mod tool;

pub use agent_tool::AgentTool;
pub use count::{COUNT_PAPERS_TOOL, CountPapersTool, count_papers};
pub use registry::ToolRegistry;
pub use tool::Tool;
