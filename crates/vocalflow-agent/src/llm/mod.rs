//! LLM integration layer.
//!
//! This module provides the interface between the workflow pipeline and
//! large language model providers.  It is organized into:
//!
//! - [`types`] -- Core data types (roles, messages, chat requests).
//! - [`client`] -- HTTP client for Anthropic and OpenAI APIs.
//! - [`model`] -- The [`LanguageModel`] trait the pipeline consumes.

pub mod client;
pub mod model;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use client::{LlmClient, LlmClientConfig, LlmProvider};
pub use model::LanguageModel;
pub use types::{ChatRequest, Message, Role};
