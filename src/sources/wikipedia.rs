use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{Source, SourceContent, http_client};
use crate::pipeline::Query;

/// Looks the query up by article title through the Wikipedia REST page
/// summary endpoint.
pub struct WikipediaSource {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    extract: String,
}

impl WikipediaSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: Url::parse(base_url)?,
        })
    }

    fn summary_url(&self, query: &Query) -> anyhow::Result<Url> {
        let title = query.as_str().replace(' ', "_");
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("invalid Wikipedia base url {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "rest_v1", "page", "summary", title.as_str()]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Source for WikipediaSource {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn fetch(&self, query: &Query) -> anyhow::Result<SourceContent> {
        let url = self.summary_url(query)?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => anyhow::bail!("no Wikipedia article for '{query}'"),
            status if !status.is_success() => {
                anyhow::bail!("Wikipedia returned {status} for '{query}'")
            }
            _ => {}
        }

        let summary: PageSummary = response.json().await?;
        if summary.extract.trim().is_empty() {
            anyhow::bail!("Wikipedia article '{}' has no text", summary.title);
        }

        let mut fields = vec![("title", summary.title)];
        if let Some(description) = summary.description.filter(|d| !d.is_empty()) {
            fields.push(("description", description));
        }
        fields.push(("content", summary.extract));

        tracing::debug!(%query, "Successfully fetched Wikipedia summary");
        Ok(SourceContent::structured(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(raw: &str) -> Query {
        Query::parse(raw).unwrap()
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let source = WikipediaSource::new("https://en.wikipedia.org", Duration::from_secs(1)).unwrap();
        let url = source.summary_url(&query("Who? Inc")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Who%3F_Inc"
        );
    }

    #[tokio::test]
    async fn test_fetch_returns_structured_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Acme_Corp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Acme Corp",
                "description": "Fictional company",
                "extract": "Acme Corp is a fictional corporation."
            })))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let content = source.fetch(&query("Acme Corp")).await.unwrap();

        let SourceContent::Structured(fields) = content else {
            panic!("expected structured content");
        };
        assert_eq!(fields["title"], "Acme Corp");
        assert_eq!(fields["description"], "Fictional company");
        assert_eq!(fields["content"], "Acme Corp is a fictional corporation.");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = source.fetch(&query("Nobody Special")).await.unwrap_err();
        assert!(err.to_string().contains("no Wikipedia article"));
    }

    #[tokio::test]
    async fn test_fetch_empty_extract_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Acme Corp",
                "extract": ""
            })))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(source.fetch(&query("Acme Corp")).await.is_err());
    }
}
