//! Error types for finder-core

use thiserror::Error;

/// Result type alias for finder-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent and tool operations
#[derive(Error, Debug)]
pub enum Error {
    /// Agent or runtime initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// A delegated agent failed terminally; no partial result is available
    #[error("Delegation to '{agent}' failed: {reason}")]
    Delegation {
        /// Name of the agent or tool that was delegated to
        agent: String,
        /// Underlying failure
        reason: String,
    },

    /// A collaborator returned data that does not match its contract
    #[error("Malformed results: {0}")]
    MalformedResults(String),

    /// Tool parameters did not match the tool's input schema
    #[error("Invalid tool parameters: {0}")]
    InvalidParameters(String),

    /// Requested tool is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

impl Error {
    /// Build a delegation error
    pub fn delegation(agent: impl Into<String>, reason: impl ToString) -> Self {
        Self::Delegation {
            agent: agent.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the whole request
    ///
    /// Fatal errors are never converted into a degraded result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Delegation { .. } | Self::MalformedResults(_))
    }
}
