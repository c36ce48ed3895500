use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::collect::CollectionResult;
use super::dimension::{AnalysisDimension, DimensionResult};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::{EventSink, PipelineEvent};
use crate::llm::{GenerateRequest, LlmClient};
use crate::sources::SourceContent;

const SYSTEM_PROMPT: &str = "You are a senior research analyst. Base every statement on the \
information provided, say so when the information is insufficient, and follow the requested \
output format exactly.";

pub const STATUS_INCOMPLETE: &str = "Analysis incomplete";

/// Tokens and estimated cost spent on the dimension calls that produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl Usage {
    fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost_usd += other.cost_usd;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusNote {
    pub status: String,
    pub message: String,
}

/// Output of the synthesizer. `analysis` only ever holds dimensions that
/// produced a usable result.
#[derive(Debug, Clone, Serialize)]
pub struct InsightRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub sources_analyzed: usize,
    pub analysis: BTreeMap<AnalysisDimension, DimensionResult>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusNote>,
}

impl InsightRecord {
    fn new(query: impl Into<String>, sources_analyzed: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            query: query.into(),
            sources_analyzed,
            analysis: BTreeMap::new(),
            usage: Usage::default(),
            error: None,
            status: None,
        }
    }

    /// Minimal record for a synthesis that could not run at all.
    pub fn failed(query: impl Into<String>, sources_analyzed: usize, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(StatusNote {
                status: STATUS_INCOMPLETE.to_string(),
                message: format!("Analysis failed: {error}"),
            }),
            error: Some(error),
            ..Self::new(query, sources_analyzed)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Dimensions present in `analysis`, in fixed order.
    pub fn dimensions(&self) -> Vec<AnalysisDimension> {
        self.analysis.keys().copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub concurrency: usize,
    pub excerpt_chars: usize,
}

impl SynthesisSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            concurrency: config.analysis_concurrency.max(1),
            excerpt_chars: config.context_excerpt_chars,
        }
    }
}

/// Builds the shared analysis context for a collection.
pub fn build_context(collection: &CollectionResult, excerpt_chars: usize) -> AppResult<String> {
    let mut context = String::from("Analyze the following information:\n\n");
    writeln!(context, "Query: {}", collection.query())?;
    writeln!(context, "Sources: {}", collection.sources().join(", "))?;
    context.push('\n');

    for (name, content) in collection.raw_content() {
        write!(context, "\n{}:\n", name.to_uppercase())?;
        match content {
            SourceContent::Structured(fields) => {
                for (key, value) in fields {
                    match value {
                        Value::String(text) => writeln!(context, "{key}: {text}")?,
                        other => writeln!(context, "{key}: {}", serde_json::to_string(other)?)?,
                    }
                }
            }
            SourceContent::Text(text) => {
                writeln!(context, "{}", excerpt(text, excerpt_chars))?;
            }
        }
    }

    Ok(context)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Runs every analysis dimension against a collection.
pub struct Synthesizer {
    llm: Arc<LlmClient>,
    settings: SynthesisSettings,
    sink: Arc<dyn EventSink>,
}

impl Synthesizer {
    pub fn new(llm: Arc<LlmClient>, settings: SynthesisSettings, sink: Arc<dyn EventSink>) -> Self {
        Self {
            llm,
            settings,
            sink,
        }
    }

    /// Never fails. Dimension failures drop the dimension; a failure to build
    /// the context yields a record with `error` set.
    #[tracing::instrument(
        name = "pipeline_stage synthesize",
        skip(self, collection),
        fields(
            pipeline.stage = "synthesize",
            research.sources_analyzed = collection.len(),
            research.dimensions_succeeded,
            research.dimensions_failed,
        )
    )]
    pub async fn synthesize(&self, collection: &CollectionResult) -> InsightRecord {
        let query = collection.query().to_string();

        let context = match build_context(collection, self.settings.excerpt_chars) {
            Ok(context) => context,
            Err(err) => return self.fail(query, collection.len(), err),
        };

        let mut record = InsightRecord::new(query, collection.len());

        let outcomes: Vec<_> = futures::stream::iter(AnalysisDimension::ALL)
            .map(|dimension| self.run_dimension(dimension, &context))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut failed = 0;
        for (dimension, outcome) in outcomes {
            match outcome {
                Some((result, usage)) => {
                    record.usage.add(usage);
                    record.analysis.insert(dimension, result);
                }
                None => failed += 1,
            }
        }

        let span = tracing::Span::current();
        span.record("research.dimensions_succeeded", record.analysis.len());
        span.record("research.dimensions_failed", failed);

        self.sink.record(PipelineEvent::SynthesisFinished {
            succeeded: record.analysis.len(),
            failed,
        });

        record
    }

    /// Entry point for a collection that arrives serialized, for example one
    /// loaded from disk. A value that does not decode yields a failed record.
    pub async fn synthesize_value(&self, value: &Value) -> InsightRecord {
        match serde_json::from_value::<CollectionResult>(value.clone()) {
            Ok(collection) => self.synthesize(&collection).await,
            Err(err) => {
                let query = value.get("query").and_then(Value::as_str).unwrap_or_default();
                let sources = value
                    .get("sources")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                self.fail(
                    query.to_string(),
                    sources,
                    AppError::Synthesis(format!("malformed collection result: {err}")),
                )
            }
        }
    }

    fn fail(&self, query: String, sources: usize, err: AppError) -> InsightRecord {
        let error = err.to_string();
        self.sink.record(PipelineEvent::SynthesisFailed {
            error: error.clone(),
        });
        InsightRecord::failed(query, sources, error)
    }

    async fn run_dimension(
        &self,
        dimension: AnalysisDimension,
        context: &str,
    ) -> (AnalysisDimension, Option<(DimensionResult, Usage)>) {
        let span = tracing::info_span!("analyze_dimension", research.dimension = dimension.key());

        let outcome = self.analyze(dimension, context).instrument(span).await;

        match outcome {
            Ok((result, usage)) => {
                self.sink.record(PipelineEvent::DimensionSucceeded {
                    dimension,
                    fallback: result.is_fallback(),
                });
                (dimension, Some((result, usage)))
            }
            Err(err) => {
                self.sink.record(PipelineEvent::DimensionFailed {
                    dimension,
                    error: err.to_string(),
                });
                (dimension, None)
            }
        }
    }

    async fn analyze(
        &self,
        dimension: AnalysisDimension,
        context: &str,
    ) -> AppResult<(DimensionResult, Usage)> {
        let resp = self
            .llm
            .generate(&GenerateRequest {
                model: self.settings.model.clone(),
                system: SYSTEM_PROMPT.to_string(),
                prompt: dimension.prompt(context),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                stage: dimension.key().to_string(),
            })
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;

        let result = dimension.parse(&resp.content).ok_or_else(|| {
            AppError::Synthesis(format!("unusable {dimension} reply from {}", resp.model))
        })?;

        Ok((
            result,
            Usage {
                input_tokens: u64::from(resp.input_tokens),
                output_tokens: u64::from(resp.output_tokens),
                cost_usd: resp.cost_usd,
            },
        ))
    }
}
