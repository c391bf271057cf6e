//! One-shot pipeline over a finished recording: correlate, then generate.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::correlator::{self, CorrelationStatistics, EventCorrelator};
use crate::events::{BrowserEvent, Recording, VoiceEvent};
use crate::generator::WorkflowGenerator;
use crate::workflow::WorkflowDocument;

/// What a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub workflow: WorkflowDocument,
    /// `None` when there were no browser events.
    pub statistics: Option<CorrelationStatistics>,
}

/// Runs correlation and generation for a recording session.
pub struct VoicePipeline {
    correlator: EventCorrelator,
    generator: WorkflowGenerator,
}

impl VoicePipeline {
    pub fn new(correlator: EventCorrelator, generator: WorkflowGenerator) -> Self {
        Self {
            correlator,
            generator,
        }
    }

    pub fn correlator(&self) -> &EventCorrelator {
        &self.correlator
    }

    pub async fn run(
        &self,
        browser_events: &[BrowserEvent],
        voice_events: &[VoiceEvent],
        goal: Option<&str>,
    ) -> PipelineOutput {
        let correlations = self.correlator.correlate(browser_events, voice_events);
        let statistics = correlator::statistics(&correlations);

        if let Some(stats) = &statistics {
            info!(
                correlated = stats.correlated_events,
                total = stats.total_browser_events,
                rate = stats.correlation_rate,
                "correlation statistics"
            );
        }

        let workflow = self.generator.generate(&correlations, goal).await;

        PipelineOutput {
            workflow,
            statistics,
        }
    }

    /// Convert recorder output to events and run the pipeline.
    pub async fn run_recording(&self, recording: &Recording, goal: Option<&str>) -> PipelineOutput {
        let browser_events = recording.browser_events();
        let voice_events = recording.voice_events();
        self.run(&browser_events, &voice_events, goal).await
    }
}
