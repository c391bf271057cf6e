//! Event data model and ingestion.
//!
//! Two independent streams feed the pipeline: mechanical [`BrowserEvent`]s
//! from the recorder and semantic [`VoiceEvent`]s from the transcriber.  They
//! share no identifier, only a session, a page URL and approximate
//! timestamps in seconds.
//!
//! The recorder ships its own record shape ([`RecordedStep`], millisecond
//! timestamps, camelCase locators); [`Recording`] bundles those records with
//! the utterances captured during the same session and converts both into
//! the pipeline's event types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session id assigned to recordings that do not carry one.
pub const DEFAULT_SESSION_ID: &str = "current_session";

/// Confidence assumed for utterances that arrive without one.
pub const DEFAULT_UTTERANCE_CONFIDENCE: f64 = 0.8;

// ---------------------------------------------------------------------------
// Pipeline events
// ---------------------------------------------------------------------------

/// A transcribed utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEvent {
    pub id: String,
    /// Raw utterance text.
    pub text: String,
    /// Seconds, monotonic within a session.
    pub timestamp: f64,
    /// Transcription reliability in `[0, 1]`.
    pub confidence: f64,
    pub session_id: String,
    /// Page context at utterance time.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

impl VoiceEvent {
    /// Convert the `index`-th recorded utterance of a session.
    pub fn from_recorded(index: usize, utterance: &RecordedUtterance, session_id: &str) -> Self {
        Self {
            id: format!("voice_{index}"),
            text: utterance.text.clone(),
            timestamp: utterance.timestamp,
            confidence: utterance
                .confidence
                .unwrap_or(DEFAULT_UTTERANCE_CONFIDENCE),
            session_id: session_id.to_owned(),
            url: utterance.url.clone(),
            intent_type: None,
            variables: None,
        }
    }
}

/// A structured browser interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEvent {
    pub id: String,
    /// `click`, `input`, `navigation`, `scroll`, `select`, `hover`, ...
    #[serde(rename = "type")]
    pub event_type: String,
    /// Seconds.
    pub timestamp: f64,
    pub url: String,
    pub session_id: String,
    #[serde(default)]
    pub xpath: Option<String>,
    #[serde(default)]
    pub css_selector: Option<String>,
    #[serde(default)]
    pub element_tag: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub tab_id: Option<String>,
}

impl BrowserEvent {
    /// Convert a recorder step.  The recorder stamps milliseconds; the
    /// pipeline works in seconds.
    pub fn from_recorded(step: &RecordedStep, session_id: &str) -> Self {
        Self {
            id: format!("browser_{}", step.timestamp),
            event_type: step.step_type.clone(),
            timestamp: step.timestamp / 1000.0,
            url: step.url.clone(),
            session_id: session_id.to_owned(),
            xpath: step.xpath.clone(),
            css_selector: step.css_selector.clone(),
            element_tag: step.element_tag.clone(),
            value: step.value.clone(),
            tab_id: step.tab_id.as_ref().and_then(tab_id_string),
        }
    }
}

/// Recorders disagree on whether tab ids are numbers or strings.
fn tab_id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Recorder records
// ---------------------------------------------------------------------------

/// One step as emitted by the browser recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedStep {
    #[serde(rename = "type")]
    pub step_type: String,
    /// Milliseconds.
    pub timestamp: f64,
    pub url: String,
    #[serde(default)]
    pub xpath: Option<String>,
    #[serde(default)]
    pub css_selector: Option<String>,
    #[serde(default)]
    pub element_tag: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub tab_id: Option<serde_json::Value>,
}

/// One utterance captured while recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedUtterance {
    pub text: String,
    /// Seconds.
    pub timestamp: f64,
    pub url: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Everything captured during one recording session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub steps: Vec<RecordedStep>,
    #[serde(default, alias = "voiceEvents")]
    pub utterances: Vec<RecordedUtterance>,
}

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_owned()
}

impl Recording {
    /// The recorder steps as pipeline browser events.
    pub fn browser_events(&self) -> Vec<BrowserEvent> {
        self.steps
            .iter()
            .map(|step| BrowserEvent::from_recorded(step, &self.session_id))
            .collect()
    }

    /// The captured utterances as pipeline voice events.
    pub fn voice_events(&self) -> Vec<VoiceEvent> {
        self.utterances
            .iter()
            .enumerate()
            .map(|(i, u)| VoiceEvent::from_recorded(i, u, &self.session_id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
