pub mod company_db;
pub mod web_search;
pub mod wikipedia;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::pipeline::Query;

pub use company_db::CompanyDbSource;
pub use web_search::WebSearchSource;
pub use wikipedia::WikipediaSource;

const USER_AGENT: &str = concat!(
    "ai-research-agent/",
    env!("CARGO_PKG_VERSION"),
    " (automated research report generator)"
);

/// What a source hands back: either named fields or a block of free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceContent {
    Structured(Map<String, Value>),
    Text(String),
}

impl SourceContent {
    pub fn structured<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Structured(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single best-effort data source. `fetch` returns the whole content or an
/// error; partial content is never reported.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, query: &Query) -> anyhow::Result<SourceContent>;
}

/// The configured sources in priority order.
pub fn default_sources(config: &Config) -> anyhow::Result<Vec<Box<dyn Source>>> {
    Ok(vec![
        Box::new(WikipediaSource::new(
            &config.wikipedia_base_url,
            config.source_timeout,
        )?),
        Box::new(WebSearchSource),
        Box::new(CompanyDbSource),
    ])
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_keeps_field_order() {
        let content = SourceContent::structured([("name", "Acme"), ("founded", "1947")]);
        let SourceContent::Structured(fields) = content else {
            panic!("expected structured content");
        };
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "founded"]);
    }

    #[test]
    fn test_untagged_round_trip_shapes() {
        let text: SourceContent = serde_json::from_str("\"plain text\"").unwrap();
        assert_eq!(text, SourceContent::Text("plain text".to_string()));

        let fields: SourceContent = serde_json::from_str(r#"{"title": "Acme"}"#).unwrap();
        assert!(matches!(fields, SourceContent::Structured(_)));
    }

    #[test]
    fn test_default_sources_priority_order() {
        let config = Config::from_lookup(|_| None).unwrap();
        let sources = default_sources(&config).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["wikipedia", "web_search", "company_database"]);
    }
}
