//! Speech transcription collaborator.
//!
//! Turns raw audio bytes into an utterance plus a confidence score.  Every
//! failure mode (audio too short or too large, undecodable input, endpoint
//! errors) surfaces as `None` so the caller's pipeline is never interrupted
//! by a bad clip.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Clips below this size are too short for the endpoint to transcribe.
pub const MIN_AUDIO_BYTES: usize = 8192;

/// The transcription endpoint rejects uploads above 25 MiB.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Container names tried in order.  The endpoint sniffs the format from the
/// file name, so an unlabeled clip gets several chances.
const CONTAINER_NAMES: [&str; 5] = [
    "audio.wav",
    "audio.mp3",
    "audio.m4a",
    "audio.ogg",
    "audio.webm",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A transcribed utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// The recognized text, trimmed.
    pub text: String,
    /// Reliability of the transcription in `[0, 1]`.
    pub confidence: f64,
}

/// Anything that can turn audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes.  Returns `None` when no text could be
    /// produced.
    async fn transcribe(&self, audio: &[u8]) -> Option<Transcription>;

    /// Transcribe base64-encoded audio, as browsers usually ship it.
    async fn transcribe_base64(&self, encoded: &str) -> Option<Transcription> {
        match BASE64.decode(encoded.trim()) {
            Ok(bytes) => {
                debug!(size = bytes.len(), "decoded base64 audio");
                self.transcribe(&bytes).await
            }
            Err(e) => {
                warn!(error = %e, "failed to decode base64 audio");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Whisper
// ---------------------------------------------------------------------------

/// Configuration for [`WhisperTranscriber`].
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// API key for the transcription endpoint.
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// ISO-639-1 language hint.
    pub language: String,
    /// Confidence reported for every successful transcription.  The
    /// endpoint does not return one.
    pub confidence: f64,
    /// HTTP timeout per attempt.
    pub timeout: Duration,
}

impl WhisperConfig {
    /// Defaults for the hosted OpenAI endpoint.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "whisper-1".into(),
            language: "zh".into(),
            confidence: 0.8,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Transcriber backed by an OpenAI-compatible `/audio/transcriptions`
/// endpoint.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    http: reqwest::Client,
}

/// The subset of the transcription response we read.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl WhisperTranscriber {
    /// Create a transcriber.  Fails when the API key is empty.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: "transcription".into(),
            });
        }
        if !(0.0..=1.0).contains(&config.confidence) {
            return Err(AgentError::ConfigError {
                reason: format!(
                    "transcription confidence must be within [0, 1], got {}",
                    config.confidence
                ),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::TranscriptionFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// Check the clip size against the endpoint limits.
    pub fn accepts(len: usize) -> bool {
        (MIN_AUDIO_BYTES..=MAX_AUDIO_BYTES).contains(&len)
    }

    /// One upload attempt with the given container name.
    async fn attempt(&self, audio: &[u8], file_name: &'static str) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);
        let part = Part::bytes(audio.to_vec()).file_name(file_name);
        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone());

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(
            |e| AgentError::TranscriptionFailed {
                reason: format!("invalid authorization header: {e}"),
            },
        )?;

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AgentError::TranscriptionFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AgentError::TranscriptionFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::TranscriptionFailed {
                reason: format!("API returned {status}: {body}"),
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)?;
        Ok(parsed.text.trim().to_owned())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Option<Transcription> {
        if !Self::accepts(audio.len()) {
            warn!(
                size = audio.len(),
                min = MIN_AUDIO_BYTES,
                max = MAX_AUDIO_BYTES,
                "audio clip outside accepted size range"
            );
            return None;
        }

        for file_name in CONTAINER_NAMES {
            match self.attempt(audio, file_name).await {
                Ok(text) if !text.is_empty() => {
                    info!(container = file_name, chars = text.chars().count(), "transcription succeeded");
                    return Some(Transcription {
                        text,
                        confidence: self.config.confidence,
                    });
                }
                Ok(_) => debug!(container = file_name, "empty transcription result"),
                Err(e) => warn!(container = file_name, error = %e, "transcription attempt failed"),
            }
        }

        warn!(size = audio.len(), "all audio containers failed transcription");
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
