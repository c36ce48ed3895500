//! Event sink injected into the pipeline stages.
//!
//! Stages report what happened through [`EventSink::record`] instead of
//! reaching for global logging, so callers can observe a run (or assert on it
//! in tests) without installing a subscriber.

use std::sync::Mutex;

use opentelemetry::KeyValue;

use crate::pipeline::dimension::AnalysisDimension;
use crate::telemetry::metrics::{
    DIMENSIONS_FAILED, DIMENSIONS_SUCCEEDED, SOURCES_COLLECTED, SOURCES_FAILED,
    SYNTHESIS_FAILURES,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SourceCollected {
        source: String,
    },
    SourceFailed {
        source: String,
        error: String,
    },
    CollectionFinished {
        query: String,
        sources: usize,
    },
    DimensionSucceeded {
        dimension: AnalysisDimension,
        fallback: bool,
    },
    DimensionFailed {
        dimension: AnalysisDimension,
        error: String,
    },
    SynthesisFinished {
        succeeded: usize,
        failed: usize,
    },
    SynthesisFailed {
        error: String,
    },
    ReportComposed {
        sections: usize,
    },
    CompositionFailed {
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: PipelineEvent);
}

/// Default sink: structured `tracing` events plus the research counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::SourceCollected { source } => {
                tracing::info!(%source, "Source collected");
                SOURCES_COLLECTED.add(1, &[KeyValue::new("research.source", source)]);
            }
            PipelineEvent::SourceFailed { source, error } => {
                tracing::warn!(%source, %error, "Source unavailable, skipping");
                SOURCES_FAILED.add(1, &[KeyValue::new("research.source", source)]);
            }
            PipelineEvent::CollectionFinished { query, sources } => {
                tracing::info!(%query, sources, "Collection completed");
            }
            PipelineEvent::DimensionSucceeded {
                dimension,
                fallback,
            } => {
                if fallback {
                    tracing::info!(
                        dimension = dimension.key(),
                        "Structured parse failed, kept raw text as summary"
                    );
                } else {
                    tracing::info!(dimension = dimension.key(), "Dimension analyzed");
                }
                DIMENSIONS_SUCCEEDED.add(
                    1,
                    &[
                        KeyValue::new("research.dimension", dimension.key()),
                        KeyValue::new("research.fallback", fallback),
                    ],
                );
            }
            PipelineEvent::DimensionFailed { dimension, error } => {
                tracing::warn!(dimension = dimension.key(), %error, "Dimension analysis failed");
                DIMENSIONS_FAILED.add(1, &[KeyValue::new("research.dimension", dimension.key())]);
            }
            PipelineEvent::SynthesisFinished { succeeded, failed } => {
                tracing::info!(succeeded, failed, "Data analysis completed");
            }
            PipelineEvent::SynthesisFailed { error } => {
                tracing::error!(%error, "Error during analysis");
                SYNTHESIS_FAILURES.add(1, &[]);
            }
            PipelineEvent::ReportComposed { sections } => {
                tracing::info!(sections, "Report generated successfully");
            }
            PipelineEvent::CompositionFailed { error } => {
                tracing::error!(%error, "Error generating report");
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(PipelineEvent::SourceCollected {
            source: "wikipedia".to_string(),
        });
        sink.record(PipelineEvent::SourceFailed {
            source: "web_search".to_string(),
            error: "timeout".to_string(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PipelineEvent::SourceCollected { source } if source == "wikipedia"));
        assert!(matches!(&events[1], PipelineEvent::SourceFailed { .. }));
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        sink.record(PipelineEvent::DimensionSucceeded {
            dimension: AnalysisDimension::Swot,
            fallback: true,
        });
        sink.record(PipelineEvent::DimensionFailed {
            dimension: AnalysisDimension::History,
            error: "quota".to_string(),
        });
        sink.record(PipelineEvent::ReportComposed { sections: 3 });
    }
}
