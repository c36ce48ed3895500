use reqwest::Url;

use super::{Source, SourceContent};
use crate::pipeline::Query;

/// Stand-in for a paid search API: produces the three result entries such an
/// API would return for a subject, without network access.
pub struct WebSearchSource;

struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

impl WebSearchSource {
    fn hits(query: &Query) -> anyhow::Result<Vec<SearchHit>> {
        let q = query.as_str();
        let handle = q.to_lowercase().replace(' ', "");

        Ok(vec![
            SearchHit {
                title: format!("{q} - Official Information"),
                url: Url::parse_with_params("https://example.com/search", &[("q", q)])?.into(),
                snippet: format!("Information about {q} from official sources."),
            },
            SearchHit {
                title: format!("{q} - LinkedIn Profile"),
                url: Url::parse("https://linkedin.com/in/")?.join(&handle)?.into(),
                snippet: format!("Professional details about {q}."),
            },
            SearchHit {
                title: format!("{q} - Recent News"),
                url: Url::parse_with_params("https://news.google.com/search", &[("q", q)])?.into(),
                snippet: format!("Latest news and updates about {q}."),
            },
        ])
    }
}

#[async_trait::async_trait]
impl Source for WebSearchSource {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn fetch(&self, query: &Query) -> anyhow::Result<SourceContent> {
        let hits = Self::hits(query)?;
        tracing::debug!(%query, results = hits.len(), "Retrieved search results");

        let text = hits
            .iter()
            .map(|hit| format!("{} <{}>: {}", hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(SourceContent::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_three_lines() {
        let query = Query::parse("Acme Corp").unwrap();
        let content = WebSearchSource.fetch(&query).await.unwrap();

        let SourceContent::Text(text) = content else {
            panic!("expected text content");
        };
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Acme Corp - Official Information"));
        assert!(lines[0].contains("q=Acme+Corp"));
        assert!(lines[1].contains("https://linkedin.com/in/acmecorp"));
    }
}
