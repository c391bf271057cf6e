//! CLI argument definitions for vocalflow.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use vocalflow_intent::CorrelationMethod;

/// vocalflow -- voice-annotated browser recordings to automation workflows.
#[derive(Parser)]
#[command(
    name = "vocalflow",
    version,
    about = "vocalflow -- voice-enhanced workflow generation",
    long_about = "Turns a recorded browser session plus spoken annotations into a \
                  structured, parameterized automation workflow."
)]
pub struct Cli {
    /// Configuration file (TOML, or JSON by extension).
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Correlate, analyze and generate the enhanced workflow for a recording.
    Generate {
        /// Recording JSON (`steps` plus `utterances`).
        #[arg(long, short)]
        recording: PathBuf,

        /// Goal description used as the workflow description.
        #[arg(long, short)]
        goal: Option<String>,

        /// Write the workflow here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print correlation results and statistics for a recording.
    Correlate {
        #[arg(long, short)]
        recording: PathBuf,

        /// Scoring method; overrides the configuration.
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Candidate radius in seconds; overrides the configuration.
        #[arg(long)]
        time_window: Option<f64>,

        /// Acceptance gate; overrides the configuration.
        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// Print the rule-based intent analysis of each text.
    Analyze {
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Transcribe an audio file.
    Transcribe {
        audio: PathBuf,
    },
}

/// Command-line spelling of [`CorrelationMethod`].
#[derive(Clone, Copy, ValueEnum)]
pub enum MethodArg {
    TimeWindow,
    Semantic,
    Hybrid,
}

impl From<MethodArg> for CorrelationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::TimeWindow => CorrelationMethod::TimeWindow,
            MethodArg::Semantic => CorrelationMethod::Semantic,
            MethodArg::Hybrid => CorrelationMethod::Hybrid,
        }
    }
}
