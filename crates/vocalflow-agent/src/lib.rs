//! External collaborators for the vocalflow pipeline.
//!
//! The workflow core consumes two services it does not own: a language model
//! that can refine workflow steps, and a transcription service that turns
//! recorded audio into utterances.  This crate provides both behind traits
//! so the core can be tested with scripted doubles.
//!
//! ## Modules
//!
//! - [`llm`] -- LLM client, wire types, and the [`LanguageModel`] seam.
//! - [`transcribe`] -- The [`Transcriber`] seam and a Whisper-API client.
//! - [`error`] -- Agent error types.

pub mod error;
pub mod llm;
pub mod transcribe;

// Re-export the most commonly used types at the crate root.
pub use error::{AgentError, Result};
pub use llm::{ChatRequest, LanguageModel, LlmClient, LlmClientConfig, LlmProvider, Message, Role};
pub use transcribe::{Transcriber, Transcription, WhisperConfig, WhisperTranscriber};
