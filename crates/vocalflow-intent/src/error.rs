//! Intent engine error types.
//!
//! Only configuration problems surface as [`IntentError`].  Collaborator
//! failures during analysis and generation are recovered locally and never
//! reach the caller.

/// Unified error type for the workflow pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// A workflow generator was requested without a language model.
    #[error("a language model is required to build a workflow generator")]
    MissingLanguageModel,

    /// A construction-time option is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A rule-table pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
