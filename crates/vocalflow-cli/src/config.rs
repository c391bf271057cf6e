//! Application configuration.
//!
//! Read from `config/default.toml` (or a `.json` file), then overridden by
//! `VOCALFLOW_*` environment variables.  A missing file means defaults.
//! API keys are never read from the file, only from the environment.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vocalflow_agent::LlmProvider;
use vocalflow_intent::{CorrelatorConfig, GeneratorConfig};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[llm]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: LlmProvider,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key.  Defaults to the
    /// provider's conventional one.
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: "claude-sonnet-4-20250514".into(),
            base_url: None,
            api_key_env: None,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

impl LlmSection {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(self.provider.default_api_key_env())
    }
}

/// `[transcription]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSection {
    pub model: String,
    pub language: String,
    pub base_url: String,
    /// Reported for every transcription.
    pub confidence: f64,
    pub api_key_env: String,
}

impl Default for TranscriptionSection {
    fn default() -> Self {
        Self {
            model: "whisper-1".into(),
            language: "zh".into(),
            base_url: "https://api.openai.com/v1".into(),
            confidence: 0.8,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub correlator: CorrelatorConfig,
    pub generator: GeneratorConfig,
    pub llm: LlmSection,
    pub transcription: TranscriptionSection,
}

impl AppConfig {
    /// Load the file at `path` and apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse the file at `path`; defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse JSON config {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("failed to parse TOML config {}", path.display()))?
        };

        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply `VOCALFLOW_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("VOCALFLOW_TIME_WINDOW") {
            self.correlator.time_window = v
                .trim()
                .parse()
                .with_context(|| format!("VOCALFLOW_TIME_WINDOW is not a number: {v}"))?;
        }
        if let Some(v) = lookup("VOCALFLOW_MIN_CONFIDENCE") {
            self.correlator.min_confidence = v
                .trim()
                .parse()
                .with_context(|| format!("VOCALFLOW_MIN_CONFIDENCE is not a number: {v}"))?;
        }
        if let Some(v) = lookup("VOCALFLOW_CORRELATION_METHOD") {
            self.correlator.correlation_method =
                v.parse().context("invalid VOCALFLOW_CORRELATION_METHOD")?;
        }
        if let Some(v) = lookup("VOCALFLOW_LLM_PROVIDER") {
            self.llm.provider = v.parse().context("invalid VOCALFLOW_LLM_PROVIDER")?;
        }
        if let Some(v) = lookup("VOCALFLOW_LLM_MODEL") {
            self.llm.model = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use vocalflow_intent::CorrelationMethod;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.correlator.time_window, 5.0);
        assert_eq!(config.generator.max_concurrent_refinements, 4);
    }

    #[test]
    fn toml_sections_parse() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[correlator]
time_window = 3.5
correlation_method = "hybrid"

[generator]
refine_timeout_secs = 10

[llm]
provider = "openai_compatible"
model = "llama3"
base_url = "http://localhost:11434/v1"
api_key_env = "LOCAL_KEY"

[transcription]
language = "en"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.correlator.time_window, 3.5);
        assert_eq!(config.correlator.min_confidence, 0.3);
        assert_eq!(config.correlator.correlation_method, CorrelationMethod::Hybrid);
        assert_eq!(config.generator.refine_timeout_secs, 10);
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.api_key_env(), "LOCAL_KEY");
        assert_eq!(config.transcription.language, "en");
        assert_eq!(config.transcription.model, "whisper-1");
    }

    #[test]
    fn json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"correlator": {{"min_confidence": 0.5}}}}"#).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.correlator.min_confidence, 0.5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[correlator\ntime_window = ").unwrap();
        assert!(AppConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("VOCALFLOW_TIME_WINDOW", "8"),
                ("VOCALFLOW_MIN_CONFIDENCE", "0.1"),
                ("VOCALFLOW_CORRELATION_METHOD", "semantic"),
                ("VOCALFLOW_LLM_PROVIDER", "openai"),
                ("VOCALFLOW_LLM_MODEL", "gpt-4o"),
            ]))
            .unwrap();

        assert_eq!(config.correlator.time_window, 8.0);
        assert_eq!(config.correlator.min_confidence, 0.1);
        assert_eq!(config.correlator.correlation_method, CorrelationMethod::Semantic);
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn invalid_override_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(env(&[("VOCALFLOW_TIME_WINDOW", "soon")])).is_err());
        assert!(config.apply_overrides(env(&[("VOCALFLOW_CORRELATION_METHOD", "nearest")])).is_err());
    }
}
