//! CLI entry point for vocalflow.
//!
//! This binary provides the `vocalflow` command with subcommands for
//! generating workflows from recordings, inspecting correlation and intent
//! analysis, and transcribing audio.

mod cli;
mod config;
mod helpers;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use vocalflow_agent::{Transcriber, WhisperTranscriber};
use vocalflow_intent::correlator::statistics;
use vocalflow_intent::{EventCorrelator, IntentAnalyzer, VoicePipeline, WorkflowGenerator};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    helpers::init_tracing(if cli.verbose { "debug" } else { "info" });

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Generate {
            recording,
            goal,
            output,
        } => cmd_generate(&config, &recording, goal.as_deref(), output.as_deref()).await,
        Commands::Correlate {
            recording,
            method,
            time_window,
            min_confidence,
        } => {
            let mut config = config;
            if let Some(method) = method {
                config.correlator.correlation_method = method.into();
            }
            if let Some(window) = time_window {
                config.correlator.time_window = window;
            }
            if let Some(min) = min_confidence {
                config.correlator.min_confidence = min;
            }
            cmd_correlate(&config, &recording)
        }
        Commands::Analyze { texts } => cmd_analyze(&texts),
        Commands::Transcribe { audio } => cmd_transcribe(&config, &audio).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config: &AppConfig,
    recording: &Path,
    goal: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let recording = helpers::load_recording(recording)?;

    let model = helpers::build_language_model(&config.llm, |key| std::env::var(key).ok())?;
    let generator = WorkflowGenerator::from_optional(model, config.generator.clone())
        .with_context(|| {
            format!(
                "workflow generation needs a language model; set {}",
                config.llm.api_key_env()
            )
        })?;
    let correlator =
        EventCorrelator::new(config.correlator.clone()).context("invalid [correlator] settings")?;

    let pipeline = VoicePipeline::new(correlator, generator);
    let out = pipeline.run_recording(&recording, goal).await;

    info!(steps = out.workflow.steps.len(), "workflow generated");
    helpers::emit_json(&out.workflow, output)
}

// ---------------------------------------------------------------------------
// Subcommand: correlate
// ---------------------------------------------------------------------------

fn cmd_correlate(config: &AppConfig, recording: &Path) -> Result<()> {
    let recording = helpers::load_recording(recording)?;
    let correlator =
        EventCorrelator::new(config.correlator.clone()).context("invalid correlator settings")?;

    let results = correlator.correlate(&recording.browser_events(), &recording.voice_events());
    let summary = match statistics(&results) {
        Some(stats) => serde_json::to_value(stats)?,
        None => json!({}),
    };

    helpers::emit_json(
        &json!({
            "results": results,
            "statistics": summary,
        }),
        None,
    )
}

// ---------------------------------------------------------------------------
// Subcommand: analyze
// ---------------------------------------------------------------------------

fn cmd_analyze(texts: &[String]) -> Result<()> {
    let analyzer = IntentAnalyzer::new().context("failed to build intent analyzer")?;
    helpers::emit_json(&analyzer.batch_analyze(texts), None)
}

// ---------------------------------------------------------------------------
// Subcommand: transcribe
// ---------------------------------------------------------------------------

async fn cmd_transcribe(config: &AppConfig, audio: &Path) -> Result<()> {
    let bytes = std::fs::read(audio)
        .with_context(|| format!("failed to read audio file {}", audio.display()))?;

    let key_env = &config.transcription.api_key_env;
    let api_key = std::env::var(key_env)
        .with_context(|| format!("transcription needs an API key; set {key_env}"))?;
    let transcriber =
        WhisperTranscriber::new(helpers::whisper_config(&config.transcription, api_key))
            .context("failed to create transcriber")?;

    match transcriber.transcribe(&bytes).await {
        Some(transcription) => helpers::emit_json(&transcription, None),
        None => {
            eprintln!("no transcription produced for {}", audio.display());
            Ok(())
        }
    }
}
