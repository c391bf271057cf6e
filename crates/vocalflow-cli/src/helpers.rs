//! Shared helpers for the CLI subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vocalflow_agent::{LanguageModel, LlmClient, LlmClientConfig, LlmProvider, WhisperConfig};
use vocalflow_intent::Recording;

use crate::config::{LlmSection, TranscriptionSection};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the global tracing subscriber.  Logs go to stderr so stdout
/// carries only command output.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

pub fn load_recording(path: &Path) -> Result<Recording> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read recording {}", path.display()))?;
    let recording: Recording = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse recording {}", path.display()))?;

    info!(
        path = %path.display(),
        session = %recording.session_id,
        steps = recording.steps.len(),
        utterances = recording.utterances.len(),
        "recording loaded"
    );
    Ok(recording)
}

/// Pretty-print `value` to `output`, or to stdout when `None`.
pub fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Build the language model from `[llm]`, reading the key through `lookup`.
///
/// Returns `None` when no key is available; the caller decides whether
/// that is fatal.
pub fn build_language_model(
    section: &LlmSection,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Arc<dyn LanguageModel>>> {
    let key_env = section.api_key_env();
    let Some(api_key) = lookup(key_env).filter(|k| !k.trim().is_empty()) else {
        warn!(env = key_env, "no API key for the language model");
        return Ok(None);
    };

    let mut config = match section.provider {
        LlmProvider::Anthropic => LlmClientConfig::anthropic(api_key, section.model.clone()),
        LlmProvider::OpenAI => LlmClientConfig::openai(api_key, section.model.clone()),
    };
    if let Some(base_url) = &section.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    let config = config.with_sampling(Some(section.temperature), section.max_tokens);

    let client = LlmClient::new(config).context("failed to create LLM client")?;
    info!(
        provider = section.provider.name(),
        model = %section.model,
        "language model configured"
    );
    Ok(Some(Arc::new(client)))
}

/// Whisper configuration from `[transcription]` and the given key.
pub fn whisper_config(section: &TranscriptionSection, api_key: String) -> WhisperConfig {
    WhisperConfig {
        base_url: section.base_url.trim_end_matches('/').to_string(),
        model: section.model.clone(),
        language: section.language.clone(),
        confidence: section.confidence,
        ..WhisperConfig::openai(api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_no_model() {
        let model = build_language_model(&LlmSection::default(), |_| None).unwrap();
        assert!(model.is_none());

        let blank = build_language_model(&LlmSection::default(), |_| Some("  ".into())).unwrap();
        assert!(blank.is_none());
    }

    #[test]
    fn key_from_configured_variable() {
        let section = LlmSection {
            provider: LlmProvider::OpenAI,
            model: "llama3".into(),
            base_url: Some("http://localhost:11434/v1/".into()),
            api_key_env: Some("LOCAL_KEY".into()),
            ..LlmSection::default()
        };
        let model = build_language_model(&section, |k| (k == "LOCAL_KEY").then(|| "k".into()))
            .unwrap()
            .unwrap();
        assert_eq!(model.model_id(), "llama3");
    }

    #[test]
    fn whisper_config_from_section() {
        let config = whisper_config(&TranscriptionSection::default(), "key".into());
        assert_eq!(config.model, "whisper-1");
        assert_eq!(config.confidence, 0.8);
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn recording_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.json");
        std::fs::write(
            &path,
            r#"{"steps": [{"type": "click", "timestamp": 1000, "url": "u"}], "utterances": []}"#,
        )
        .unwrap();

        let recording = load_recording(&path).unwrap();
        assert_eq!(recording.steps.len(), 1);
        assert!(load_recording(&dir.path().join("missing.json")).is_err());
    }
}
