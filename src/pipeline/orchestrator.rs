use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry::trace::TraceContextExt;
use serde_json::Value;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::collect::{CollectionResult, Collector};
use super::compose::{Composer, Report};
use super::synthesize::{InsightRecord, SynthesisSettings, Synthesizer};
use super::Query;
use crate::config::Config;
use crate::events::EventSink;
use crate::llm::LlmClient;
use crate::sources::{self, Source};
use crate::telemetry::metrics::{REPORT_GENERATION_DURATION, REPORT_SECTIONS};

/// Everything one run produced. `collection` is absent when the run started
/// from a serialized collection.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub collection: Option<CollectionResult>,
    pub insights: InsightRecord,
    pub report: Report,
    pub trace_id: String,
}

/// Collector → Synthesizer → Composer, each stage finishing before the next.
pub struct ResearchPipeline {
    collector: Collector,
    synthesizer: Synthesizer,
    composer: Composer,
}

impl ResearchPipeline {
    pub fn new(collector: Collector, synthesizer: Synthesizer, composer: Composer) -> Self {
        Self {
            collector,
            synthesizer,
            composer,
        }
    }

    /// Wires the default sources and the given client, all reporting to `sink`.
    pub fn from_config(
        config: &Config,
        llm: Arc<LlmClient>,
        sink: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let sources = sources::default_sources(config)?;
        Ok(Self::with_sources(config, sources, llm, sink))
    }

    pub fn with_sources(
        config: &Config,
        sources: Vec<Box<dyn Source>>,
        llm: Arc<LlmClient>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(
            Collector::new(sources, config.source_timeout, sink.clone()),
            Synthesizer::new(llm, SynthesisSettings::from_config(config), sink.clone()),
            Composer::new(sink),
        )
    }

    #[tracing::instrument(
        name = "pipeline research",
        skip(self, query),
        fields(
            research.query = %query,
            research.run_id,
            research.sections,
            research.duration_ms,
        )
    )]
    pub async fn run(&self, query: &Query) -> ResearchOutcome {
        let start = std::time::Instant::now();
        let trace_id = current_trace_id();

        let collection = self.collector.collect(query).await;
        let insights = self.synthesizer.synthesize(&collection).await;
        let report = self.composer.compose(query.as_str(), &insights);

        finish(start, "collect", &insights, &report);

        ResearchOutcome {
            collection: Some(collection),
            insights,
            report,
            trace_id,
        }
    }

    /// Runs synthesis and composition over a collection loaded from elsewhere.
    #[tracing::instrument(
        name = "pipeline research",
        skip(self, collection),
        fields(
            research.query,
            research.run_id,
            research.sections,
            research.duration_ms,
        )
    )]
    pub async fn run_from_collection(&self, collection: &Value) -> ResearchOutcome {
        let start = std::time::Instant::now();
        let trace_id = current_trace_id();

        let insights = self.synthesizer.synthesize_value(collection).await;
        tracing::Span::current().record("research.query", insights.query.as_str());
        let report = self.composer.compose(&insights.query, &insights);

        finish(start, "from_collection", &insights, &report);

        ResearchOutcome {
            collection: None,
            insights,
            report,
            trace_id,
        }
    }
}

fn current_trace_id() -> String {
    let span = tracing::Span::current();
    let context = span.context();
    let otel_span = context.span();
    otel_span.span_context().trace_id().to_string()
}

fn finish(start: std::time::Instant, mode: &'static str, insights: &InsightRecord, report: &Report) {
    let duration = start.elapsed();

    let mode_kv = KeyValue::new("research.mode", mode);
    REPORT_GENERATION_DURATION.record(duration.as_secs_f64(), &[mode_kv.clone()]);
    REPORT_SECTIONS.record(report.sections.len() as f64, &[mode_kv]);

    let span = tracing::Span::current();
    span.record("research.run_id", insights.run_id.to_string());
    span.record("research.sections", report.sections.len());
    span.record("research.duration_ms", duration.as_millis() as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, PipelineEvent};
    use crate::llm::{GenerateRequest, GenerateResponse, Provider};
    use crate::sources::SourceContent;

    struct Unreachable;

    #[async_trait::async_trait]
    impl Provider for Unreachable {
        async fn generate(&self, _req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            anyhow::bail!("connection refused")
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    struct Down;

    #[async_trait::async_trait]
    impl Source for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch(&self, _query: &Query) -> anyhow::Result<SourceContent> {
            anyhow::bail!("503 service unavailable")
        }
    }

    fn pipeline(sink: Arc<MemorySink>) -> ResearchPipeline {
        let config = Config::from_lookup(|_| None).unwrap();
        let llm = Arc::new(LlmClient::new(Arc::new(Unreachable)));
        ResearchPipeline::with_sources(&config, vec![Box::new(Down)], llm, sink)
    }

    #[tokio::test]
    async fn test_run_completes_with_nothing_available() {
        let sink = Arc::new(MemorySink::new());
        let outcome = pipeline(sink.clone())
            .run(&Query::parse("Acme Corp").unwrap())
            .await;

        let collection = outcome.collection.unwrap();
        assert!(collection.is_empty());
        assert!(outcome.insights.analysis.is_empty());
        assert!(outcome.insights.error.is_none());
        assert!(outcome.report.sections.is_empty());
        assert!(outcome.report.content.starts_with("# Research Report: Acme Corp"));
        assert!(sink.events().contains(&PipelineEvent::ReportComposed { sections: 0 }));
    }

    #[tokio::test]
    async fn test_run_from_malformed_collection_still_reports() {
        let outcome = pipeline(Arc::new(MemorySink::new()))
            .run_from_collection(&serde_json::json!({"query": "Acme Corp", "sources": 7, "raw_content": {}}))
            .await;

        assert!(outcome.collection.is_none());
        assert!(outcome.insights.is_failed());
        assert!(outcome.report.content.contains("*Note: Analysis encountered an issue:"));
    }
}
