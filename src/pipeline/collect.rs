use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Query;
use crate::error::AppError;
use crate::events::{EventSink, PipelineEvent};
use crate::sources::{Source, SourceContent};

/// Keys a serialized [`CollectionResult`] must carry.
pub const REQUIRED_KEYS: [&str; 3] = ["query", "sources", "raw_content"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_name: String,
    pub content: SourceContent,
}

/// Everything the collector gathered for one query.
///
/// Successful sources are stored once, in attempt order; the `sources` list and
/// the `raw_content` map are both views over that single list. Serialized form:
/// `{ query, timestamp, sources: [..], raw_content: { name: content } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CollectionSnapshot", into = "CollectionSnapshot")]
pub struct CollectionResult {
    query: Query,
    timestamp: DateTime<Utc>,
    records: Vec<SourceRecord>,
}

impl CollectionResult {
    pub fn new(query: Query) -> Self {
        Self::with_timestamp(query, Utc::now())
    }

    pub fn with_timestamp(query: Query, timestamp: DateTime<Utc>) -> Self {
        Self {
            query,
            timestamp,
            records: Vec::new(),
        }
    }

    /// Adds a source's content. A name seen before has its content replaced in
    /// place, so every name stays unique and keeps its original position.
    pub fn insert(&mut self, source_name: impl Into<String>, content: SourceContent) {
        let source_name = source_name.into();
        match self.records.iter_mut().find(|r| r.source_name == source_name) {
            Some(existing) => existing.content = content,
            None => self.records.push(SourceRecord {
                source_name,
                content,
            }),
        }
    }

    pub fn with_source(mut self, source_name: impl Into<String>, content: SourceContent) -> Self {
        self.insert(source_name, content);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sources(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.source_name.as_str()).collect()
    }

    pub fn raw_content(&self) -> impl Iterator<Item = (&str, &SourceContent)> {
        self.records
            .iter()
            .map(|r| (r.source_name.as_str(), &r.content))
    }

    pub fn content(&self, source_name: &str) -> Option<&SourceContent> {
        self.records
            .iter()
            .find(|r| r.source_name == source_name)
            .map(|r| &r.content)
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    query: Query,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    sources: Vec<String>,
    raw_content: BTreeMap<String, SourceContent>,
}

impl TryFrom<CollectionSnapshot> for CollectionResult {
    type Error = AppError;

    fn try_from(mut snapshot: CollectionSnapshot) -> Result<Self, Self::Error> {
        if snapshot.sources.len() != snapshot.raw_content.len() {
            return Err(AppError::Validation(format!(
                "sources lists {} entries but raw_content has {}",
                snapshot.sources.len(),
                snapshot.raw_content.len()
            )));
        }

        let mut records = Vec::with_capacity(snapshot.sources.len());
        for source_name in snapshot.sources {
            let content = snapshot.raw_content.remove(&source_name).ok_or_else(|| {
                AppError::Validation(format!(
                    "source '{source_name}' is listed twice or has no raw_content entry"
                ))
            })?;
            records.push(SourceRecord {
                source_name,
                content,
            });
        }

        Ok(Self {
            query: snapshot.query,
            timestamp: snapshot.timestamp,
            records,
        })
    }
}

impl From<CollectionResult> for CollectionSnapshot {
    fn from(result: CollectionResult) -> Self {
        let sources = result.sources().into_iter().map(String::from).collect();
        let raw_content = result
            .records
            .into_iter()
            .map(|r| (r.source_name, r.content))
            .collect();
        Self {
            query: result.query,
            timestamp: result.timestamp,
            sources,
            raw_content,
        }
    }
}

/// Checks that a serialized collection result carries the three required
/// top-level keys. Meant for callers about to trust a result from elsewhere.
pub fn validate(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| REQUIRED_KEYS.iter().all(|key| obj.contains_key(*key)))
}

/// Attempts every configured source once, in priority order.
pub struct Collector {
    sources: Vec<Box<dyn Source>>,
    timeout: Duration,
    sink: Arc<dyn EventSink>,
}

impl Collector {
    pub fn new(sources: Vec<Box<dyn Source>>, timeout: Duration, sink: Arc<dyn EventSink>) -> Self {
        Self {
            sources,
            timeout,
            sink,
        }
    }

    /// Never fails: a source that errors or times out is left out of the result.
    #[tracing::instrument(
        name = "pipeline_stage collect",
        skip(self, query),
        fields(
            pipeline.stage = "collect",
            research.query = %query,
            research.sources_attempted = self.sources.len(),
            research.sources_found,
        )
    )]
    pub async fn collect(&self, query: &Query) -> CollectionResult {
        let mut result = CollectionResult::new(query.clone());

        for source in &self.sources {
            let name = source.name().to_string();
            match self.attempt(source.as_ref(), query).await {
                Ok(content) => {
                    self.sink.record(PipelineEvent::SourceCollected {
                        source: name.clone(),
                    });
                    result.insert(name, content);
                }
                Err(err) => {
                    self.sink.record(PipelineEvent::SourceFailed {
                        source: name,
                        error: err.to_string(),
                    });
                }
            }
        }

        tracing::Span::current().record("research.sources_found", result.len());
        self.sink.record(PipelineEvent::CollectionFinished {
            query: query.to_string(),
            sources: result.len(),
        });

        result
    }

    async fn attempt(&self, source: &dyn Source, query: &Query) -> anyhow::Result<SourceContent> {
        tokio::time::timeout(self.timeout, source.fetch(query))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {}s", self.timeout.as_secs_f64()))?
    }
}
