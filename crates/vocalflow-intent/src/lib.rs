//! Voice-enhanced workflow generation.
//!
//! Turns a recorded browser session plus loosely time-aligned spoken
//! annotations into a parameterized automation workflow:
//!
//! 1. The [`EventCorrelator`] pairs each browser event with the utterances
//!    around it (same session and page, within a time window).
//! 2. The [`IntentAnalyzer`] classifies each utterance and extracts
//!    variables, conditions and parameters with deterministic rules.
//! 3. The [`WorkflowGenerator`] merges both into enhanced workflow steps,
//!    optionally refined by a language model with a rule-based fallback.
//!
//! ## Modules
//!
//! - [`events`] -- Browser/voice event types and recorder ingestion.
//! - [`correlator`] -- Event correlation and run statistics.
//! - [`analyzer`] -- Rule-based intent analysis.
//! - [`generator`] -- Workflow generation and semantic refinement.
//! - [`workflow`] -- The output document.
//! - [`pipeline`] -- Correlate-then-generate facade.
//! - [`error`] -- Error types.

pub mod analyzer;
pub mod correlator;
pub mod error;
pub mod events;
pub mod generator;
pub mod pipeline;
pub mod workflow;

mod reply;

pub use analyzer::{IntentAnalysisResult, IntentAnalyzer, IntentType};
pub use correlator::{
    CorrelationMethod, CorrelationMetadata, CorrelationResult, CorrelationStatistics,
    CorrelatorConfig, EventCorrelator,
};
pub use error::{IntentError, Result};
pub use events::{BrowserEvent, RecordedStep, RecordedUtterance, Recording, VoiceEvent};
pub use generator::{GeneratorConfig, Refinement, StepRefinement, WorkflowGenerator};
pub use pipeline::{PipelineOutput, VoicePipeline};
pub use workflow::{EnhancedWorkflowStep, VoiceContext, WorkflowDocument};
