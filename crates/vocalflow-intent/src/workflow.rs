//! Workflow document, the pipeline's output.
//!
//! A [`WorkflowDocument`] is an ordered list of [`EnhancedWorkflowStep`]s,
//! one per browser event, plus the variables and conditions collected from
//! the voice context of all steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzer::IntentType;
use crate::events::BrowserEvent;

/// Name given to every generated workflow.
pub const WORKFLOW_NAME: &str = "Enhanced Voice Workflow";

/// Description used when no goal is supplied.
pub const DEFAULT_DESCRIPTION: &str = "Voice-enhanced browser automation workflow";

pub const WORKFLOW_VERSION: &str = "1.0";

/// Type tag of conditions lifted from step voice context.
pub const VOICE_EXTRACTED: &str = "voice_extracted";

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Map a browser event type to the step action that replays it.
pub fn action_for_event_type(event_type: &str) -> &'static str {
    match event_type {
        "click" => "click_element",
        "input" => "input_text",
        "navigation" => "navigate_to",
        "scroll" => "scroll_page",
        "select" => "select_option",
        "hover" => "hover_element",
        _ => "perform_action",
    }
}

/// Voice-derived context attached to an enhanced step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceContext {
    /// Raw utterance texts, in time order.
    pub instructions: Vec<String>,
    /// One intent label per instruction.
    pub intent_types: Vec<IntentType>,
    /// Only present after a successful model refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_selectors: Option<Vec<String>>,
}

/// One step of the generated workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedWorkflowStep {
    /// `step_<n>`, 1-based.
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub action: String,
    /// Element tag of the browser event.
    pub target: Option<String>,
    pub value: Option<String>,
    pub xpath: Option<String>,
    pub css_selector: Option<String>,
    pub voice_context: Option<VoiceContext>,
    pub extracted_variables: Option<BTreeMap<String, String>>,
    pub conditions: Option<Vec<String>>,
    pub enhanced: bool,
}

impl EnhancedWorkflowStep {
    /// The un-enhanced step for the `index`-th (0-based) browser event.
    pub fn from_browser_event(index: usize, event: &BrowserEvent) -> Self {
        Self {
            id: format!("step_{}", index + 1),
            step_type: event.event_type.clone(),
            action: action_for_event_type(&event.event_type).to_string(),
            target: event.element_tag.clone(),
            value: event.value.clone(),
            xpath: event.xpath.clone(),
            css_selector: event.css_selector.clone(),
            voice_context: None,
            extracted_variables: None,
            conditions: None,
            enhanced: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A workflow-level variable lifted from step voice context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVariable {
    #[serde(rename = "type")]
    pub var_type: String,
    pub default: String,
    pub description: String,
}

impl WorkflowVariable {
    fn from_placeholder(placeholder: &str) -> Self {
        Self {
            var_type: "string".into(),
            default: placeholder.to_string(),
            description: format!("Extracted from voice: {placeholder}"),
        }
    }
}

/// A workflow-level condition and the step it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCondition {
    pub condition: String,
    pub step_id: String,
    #[serde(rename = "type")]
    pub condition_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub enhanced: bool,
    /// Voice events across all correlations.
    pub voice_events_count: usize,
    /// Number of correlations, which equals the number of steps.
    pub browser_events_count: usize,
}

/// The generated workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub name: String,
    pub description: String,
    pub version: String,
    pub variables: BTreeMap<String, WorkflowVariable>,
    pub conditions: Vec<WorkflowCondition>,
    pub steps: Vec<EnhancedWorkflowStep>,
    pub metadata: WorkflowMetadata,
}

impl WorkflowDocument {
    /// Assemble a document from finished steps.
    ///
    /// Variables are registered first-write-wins in step order; conditions
    /// are listed in step-then-condition order without deduplication.
    pub fn assemble(
        steps: Vec<EnhancedWorkflowStep>,
        goal: Option<&str>,
        voice_events_count: usize,
    ) -> Self {
        let mut variables = BTreeMap::new();
        let mut conditions = Vec::new();

        for step in &steps {
            for (name, placeholder) in step.extracted_variables.iter().flatten() {
                variables
                    .entry(name.clone())
                    .or_insert_with(|| WorkflowVariable::from_placeholder(placeholder));
            }
            for condition in step.conditions.iter().flatten() {
                conditions.push(WorkflowCondition {
                    condition: condition.clone(),
                    step_id: step.id.clone(),
                    condition_type: VOICE_EXTRACTED.into(),
                });
            }
        }

        let browser_events_count = steps.len();

        Self {
            name: WORKFLOW_NAME.into(),
            description: goal.unwrap_or(DEFAULT_DESCRIPTION).to_string(),
            version: WORKFLOW_VERSION.into(),
            variables,
            conditions,
            steps,
            metadata: WorkflowMetadata {
                enhanced: true,
                voice_events_count,
                browser_events_count,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, vars: &[(&str, &str)], conditions: &[&str]) -> EnhancedWorkflowStep {
        let mut step = EnhancedWorkflowStep::from_browser_event(
            index,
            &BrowserEvent {
                id: format!("b{index}"),
                event_type: "input".into(),
                timestamp: index as f64,
                url: "u".into(),
                session_id: "s".into(),
                xpath: None,
                css_selector: None,
                element_tag: Some("input".into()),
                value: Some("admin".into()),
                tab_id: None,
            },
        );
        step.extracted_variables = Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        step.conditions = Some(conditions.iter().map(|c| c.to_string()).collect());
        step
    }

    #[test]
    fn action_table() {
        assert_eq!(action_for_event_type("click"), "click_element");
        assert_eq!(action_for_event_type("navigation"), "navigate_to");
        assert_eq!(action_for_event_type("hover"), "hover_element");
        assert_eq!(action_for_event_type("drag"), "perform_action");
    }

    #[test]
    fn base_step_copies_browser_fields() {
        let s = step(0, &[], &[]);
        assert_eq!(s.id, "step_1");
        assert_eq!(s.action, "input_text");
        assert_eq!(s.target.as_deref(), Some("input"));
        assert_eq!(s.value.as_deref(), Some("admin"));
        assert!(!s.enhanced);
    }

    #[test]
    fn first_variable_registration_wins() {
        let doc = WorkflowDocument::assemble(
            vec![
                step(0, &[("username", "${username}")], &[]),
                step(1, &[("username", "${user}")], &[]),
            ],
            None,
            2,
        );
        assert_eq!(doc.variables.len(), 1);
        assert_eq!(doc.variables["username"].default, "${username}");
        assert_eq!(doc.variables["username"].description, "Extracted from voice: ${username}");
        assert_eq!(doc.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn conditions_keep_step_order_and_duplicates() {
        let doc = WorkflowDocument::assemble(
            vec![step(0, &[], &["if a then b", "if a then b"]), step(1, &[], &["if c then d"])],
            Some("log in"),
            3,
        );
        let ids: Vec<&str> = doc.conditions.iter().map(|c| c.step_id.as_str()).collect();
        assert_eq!(ids, ["step_1", "step_1", "step_2"]);
        assert!(doc.conditions.iter().all(|c| c.condition_type == VOICE_EXTRACTED));
        assert_eq!(doc.description, "log in");
        assert_eq!(doc.metadata.browser_events_count, 2);
        assert_eq!(doc.metadata.voice_events_count, 3);
    }

    #[test]
    fn document_wire_shape() {
        let doc = WorkflowDocument::assemble(vec![step(0, &[("email", "${email}")], &[])], None, 1);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["variables"]["email"]["type"], "string");
        assert_eq!(json["steps"][0]["type"], "input");
        assert!(json["steps"][0]["voice_context"].is_null());
        assert_eq!(json["metadata"]["enhanced"], true);
    }
}
