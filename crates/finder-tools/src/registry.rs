//! Tool registry for managing available tools

use crate::Tool;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry for managing tools
///
/// Tools are registered at startup and only read afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.insert(tool.name().to_string(), tool)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.get(name).cloned()
    }

    /// List all registered tools, ordered by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<_> = tools.values().cloned().collect();
        list.sort_by(|a, b| a.name().cmp(b.name()));
        list
    }

    /// Names of all registered tools, sorted
    pub fn names(&self) -> Vec<String> {
        self.list_tools()
            .iter()
            .map(|tool| tool.name().to_string())
            .collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CountPapersTool;

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        let previous = registry.register(Arc::new(CountPapersTool));
        assert!(previous.is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("count_papers").is_some());
        assert!(registry.get("google_search_agent").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(CountPapersTool));
        let previous = registry.register(Arc::new(CountPapersTool));
        assert!(previous.is_some());
        assert_eq!(registry.names(), vec!["count_papers".to_string()]);
    }
}
