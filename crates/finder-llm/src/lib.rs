//! LLM provider abstraction layer for paper-finder
//!
//! This crate provides provider-agnostic abstractions for talking to large
//! language models:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - Tool definitions for function calling, plus built-in provider tools
//! - The [`LLMProvider`] trait
//! - [`RetryPolicy`] and [`RetryingProvider`], the exponential-backoff transport wrapper
//! - The Gemini provider (behind the `gemini` feature, on by default)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod retry;
pub mod tools;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use retry::{RetryPolicy, RetryingProvider};
pub use tools::{BuiltinTool, ToolDefinition};

#[cfg(feature = "gemini")]
pub mod providers;
