//! Enhanced workflow generator: turns correlations into a workflow.
//!
//! Each correlation becomes one step.  Steps with voice context are run
//! through the [`IntentAnalyzer`] and then offered to a [`LanguageModel`]
//! for semantic refinement.  A refinement that fails for any reason
//! (model error, timeout, malformed reply) is a [`Refinement::Failed`]
//! value, and the step falls back to rule-based enrichment.  `generate`
//! itself cannot fail.
//!
//! Refinement calls run concurrently up to a configured bound; the
//! assembled steps keep correlation order regardless of completion order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vocalflow_agent::LanguageModel;

use crate::analyzer::{IntentAnalysisResult, IntentAnalyzer};
use crate::correlator::CorrelationResult;
use crate::error::{IntentError, Result};
use crate::reply::parse_object_reply;
use crate::workflow::{EnhancedWorkflowStep, VoiceContext, WorkflowDocument};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Construction-time options for [`WorkflowGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Upper bound on a single refinement call.
    pub refine_timeout_secs: u64,
    /// Refinement calls allowed in flight at once.
    pub max_concurrent_refinements: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            refine_timeout_secs: 30,
            max_concurrent_refinements: 4,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.refine_timeout_secs == 0 {
            return Err(IntentError::InvalidConfig {
                reason: "refine_timeout_secs must be positive".into(),
            });
        }
        if self.max_concurrent_refinements == 0 {
            return Err(IntentError::InvalidConfig {
                reason: "max_concurrent_refinements must be positive".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Refinement
// ---------------------------------------------------------------------------

const REFINE_SYSTEM_PROMPT: &str = r#"You enhance browser automation workflow steps using the spoken instructions recorded alongside them.

Look for conditional logic (if ... then ...), values that should become variables (usernames, passwords and similar), the operation intended and hints about error handling.

Respond ONLY with a JSON object:
{
  "enhanced_action": "improved action description",
  "conditions": ["condition 1", "condition 2"],
  "variables": {"var_name": "var_value"},
  "error_handling": "what to do when the step fails",
  "smart_selectors": ["selector 1", "selector 2"]
}"#;

/// The structured fields of a successful refinement reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StepRefinement {
    #[serde(default)]
    pub enhanced_action: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub error_handling: Option<String>,
    #[serde(default)]
    pub smart_selectors: Vec<String>,
}

/// Outcome of one semantic refinement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    Refined(StepRefinement),
    Failed { reason: String },
}

impl Refinement {
    /// Interpret a model reply.  Anything but a JSON object with the
    /// expected field types (optionally inside a code fence) is a failure.
    pub fn from_reply(reply: &str) -> Self {
        match parse_object_reply::<StepRefinement>(reply) {
            Ok(refinement) => Self::Refined(refinement),
            Err(reason) => Self::Failed { reason },
        }
    }
}

/// Apply a successful refinement to `step`.
pub fn apply_refinement(
    mut step: EnhancedWorkflowStep,
    refinement: StepRefinement,
    instructions: Vec<String>,
    analyses: &[IntentAnalysisResult],
) -> EnhancedWorkflowStep {
    if let Some(action) = refinement.enhanced_action {
        step.action = action;
    }
    step.conditions = Some(refinement.conditions);
    step.extracted_variables = Some(refinement.variables);
    step.voice_context = Some(VoiceContext {
        instructions,
        intent_types: analyses.iter().map(|a| a.intent_type).collect(),
        error_handling: refinement.error_handling,
        smart_selectors: Some(refinement.smart_selectors),
    });
    step.enhanced = true;
    step
}

/// Enrich `step` from the analyzer results alone: union of the extracted
/// variables (later utterances overwrite earlier ones) and concatenation of
/// the conditions.
pub fn apply_rule_enrichment(
    mut step: EnhancedWorkflowStep,
    instructions: Vec<String>,
    analyses: &[IntentAnalysisResult],
) -> EnhancedWorkflowStep {
    let mut variables = BTreeMap::new();
    let mut conditions = Vec::new();
    for analysis in analyses {
        variables.extend(
            analysis
                .extracted_variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        conditions.extend(analysis.conditions.iter().cloned());
    }

    step.voice_context = Some(VoiceContext {
        instructions,
        intent_types: analyses.iter().map(|a| a.intent_type).collect(),
        error_handling: None,
        smart_selectors: None,
    });
    step.extracted_variables = Some(variables);
    step.conditions = Some(conditions);
    step.enhanced = true;
    step
}

fn refinement_prompt(
    step: &EnhancedWorkflowStep,
    instructions: &[String],
    analyses: &[IntentAnalysisResult],
) -> String {
    let mut prompt = String::from("Recorded browser operation:\n");
    prompt.push_str(&format!("- Type: {}\n", step.step_type));
    prompt.push_str(&format!("- Action: {}\n", step.action));
    prompt.push_str(&format!("- Target: {}\n", step.target.as_deref().unwrap_or("none")));
    prompt.push_str(&format!("- XPath: {}\n", step.xpath.as_deref().unwrap_or("none")));

    prompt.push_str("\nSpoken instructions:\n");
    for text in instructions {
        prompt.push_str(&format!("- {text}\n"));
    }

    prompt.push_str("\nIntent analysis:\n");
    for analysis in analyses {
        prompt.push_str(&format!(
            "- intent: {}, confidence: {:.2}\n",
            analysis.intent_type, analysis.confidence
        ));
    }

    prompt.push_str("\nProduce the enhanced step information.");
    prompt
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Builds [`WorkflowDocument`]s from correlation results.
pub struct WorkflowGenerator {
    model: Arc<dyn LanguageModel>,
    analyzer: IntentAnalyzer,
    config: GeneratorConfig,
}

impl WorkflowGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            analyzer: IntentAnalyzer::new()?,
            config,
        })
    }

    /// Like [`new`](Self::new), but reports a missing model as
    /// [`IntentError::MissingLanguageModel`].
    pub fn from_optional(
        model: Option<Arc<dyn LanguageModel>>,
        config: GeneratorConfig,
    ) -> Result<Self> {
        let model = model.ok_or(IntentError::MissingLanguageModel)?;
        Self::new(model, config)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the workflow for `correlations`, one step per entry in
    /// input order.  `goal` becomes the document description.
    pub async fn generate(
        &self,
        correlations: &[CorrelationResult],
        goal: Option<&str>,
    ) -> WorkflowDocument {
        info!(
            correlations = correlations.len(),
            model = self.model.model_id(),
            "generating enhanced workflow"
        );

        let steps: Vec<EnhancedWorkflowStep> = stream::iter(correlations.iter().enumerate())
            .map(|(index, correlation)| self.build_step(index, correlation))
            .buffered(self.config.max_concurrent_refinements)
            .collect()
            .await;

        let voice_events_count = correlations.iter().map(|c| c.voice_events.len()).sum();
        let document = WorkflowDocument::assemble(steps, goal, voice_events_count);

        info!(
            steps = document.steps.len(),
            enhanced = document.steps.iter().filter(|s| s.enhanced).count(),
            variables = document.variables.len(),
            conditions = document.conditions.len(),
            "workflow assembled"
        );

        document
    }

    async fn build_step(&self, index: usize, correlation: &CorrelationResult) -> EnhancedWorkflowStep {
        let step = EnhancedWorkflowStep::from_browser_event(index, &correlation.browser_event);
        if correlation.voice_events.is_empty() {
            return step;
        }

        let instructions: Vec<String> = correlation
            .voice_events
            .iter()
            .map(|v| v.text.clone())
            .collect();
        let analyses = self.analyzer.batch_analyze(&instructions);

        match self.refine(&step, &instructions, &analyses).await {
            Refinement::Refined(refinement) => {
                debug!(step_id = %step.id, "step refined by language model");
                apply_refinement(step, refinement, instructions, &analyses)
            }
            Refinement::Failed { reason } => {
                warn!(
                    step_id = %step.id,
                    %reason,
                    "semantic refinement failed, using rule-based enrichment"
                );
                apply_rule_enrichment(step, instructions, &analyses)
            }
        }
    }

    async fn refine(
        &self,
        step: &EnhancedWorkflowStep,
        instructions: &[String],
        analyses: &[IntentAnalysisResult],
    ) -> Refinement {
        let prompt = refinement_prompt(step, instructions, analyses);
        let limit = Duration::from_secs(self.config.refine_timeout_secs);

        match tokio::time::timeout(limit, self.model.complete(REFINE_SYSTEM_PROMPT, &prompt)).await {
            Ok(Ok(reply)) => Refinement::from_reply(&reply),
            Ok(Err(e)) => Refinement::Failed {
                reason: e.to_string(),
            },
            Err(_) => Refinement::Failed {
                reason: format!("timed out after {}s", self.config.refine_timeout_secs),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
