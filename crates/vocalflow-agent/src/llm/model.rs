//! The language-model seam consumed by the workflow pipeline.
//!
//! The pipeline never talks HTTP directly.  It hands a system prompt and a
//! user context to a [`LanguageModel`] and gets free-form text back; any
//! interpretation of that text (JSON shape checks, fallbacks) happens on the
//! caller's side.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::client::LlmClient;
use crate::llm::types::ChatRequest;

/// A chat-capable model that answers a role-tagged prompt pair.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs.
    fn model_id(&self) -> &str;

    /// Send `system` instructions plus `user` context and return the reply
    /// text verbatim.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn model_id(&self) -> &str {
        &self.config().default_model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(&ChatRequest::prompt_pair(system, user)).await
    }
}
