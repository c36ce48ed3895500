use super::{Source, SourceContent};
use crate::pipeline::Query;

/// Stand-in for a commercial company-data provider. Returns the record shape
/// such a provider exposes, with unknown values marked as such.
pub struct CompanyDbSource;

#[async_trait::async_trait]
impl Source for CompanyDbSource {
    fn name(&self) -> &str {
        "company_database"
    }

    async fn fetch(&self, query: &Query) -> anyhow::Result<SourceContent> {
        tracing::debug!(%query, "Retrieved company record");

        Ok(SourceContent::structured([
            ("name", query.to_string()),
            ("founded", "Unknown".to_string()),
            ("industry", "Unknown".to_string()),
            ("employees", "Unknown".to_string()),
            ("revenue", "Unknown".to_string()),
            ("description", format!("Company information for {query}")),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_record_fields() {
        let query = Query::parse("Acme Corp").unwrap();
        let SourceContent::Structured(fields) = CompanyDbSource.fetch(&query).await.unwrap() else {
            panic!("expected structured content");
        };
        assert_eq!(fields["name"], "Acme Corp");
        assert_eq!(fields.len(), 6);
        assert_eq!(fields["description"], "Company information for Acme Corp");
    }
}
