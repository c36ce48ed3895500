//! Files written by the binary for a run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::pipeline::collect::{REQUIRED_KEYS, validate};
use crate::pipeline::{Query, Report};

pub fn report_path(dir: &Path, query: &Query) -> PathBuf {
    dir.join(format!("report_{}.md", query.file_stem()))
}

pub fn json_path(dir: &Path, prefix: &str, query: &Query) -> PathBuf {
    dir.join(format!("{prefix}_{}.json", query.file_stem()))
}

pub async fn write_report(dir: &Path, query: &Query, report: &Report) -> AppResult<PathBuf> {
    let path = report_path(dir, query);
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, report.as_str()).await?;
    tracing::info!(path = %path.display(), "Report saved");
    Ok(path)
}

/// Writes `value` as pretty JSON to `<prefix>_<stem>.json`.
pub async fn write_json<T: Serialize>(
    dir: &Path,
    prefix: &str,
    query: &Query,
    value: &T,
) -> AppResult<PathBuf> {
    let path = json_path(dir, prefix, query);
    let body = serde_json::to_vec_pretty(value)?;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, body).await?;
    tracing::info!(path = %path.display(), "JSON saved");
    Ok(path)
}

/// Loads a saved collection result, refusing files without the required keys.
pub async fn read_collection(path: &Path) -> AppResult<Value> {
    let body = tokio::fs::read(path).await?;
    let value: Value = serde_json::from_slice(&body)?;
    if !validate(&value) {
        return Err(AppError::Validation(format!(
            "{} is not a collection result (expected keys: {})",
            path.display(),
            REQUIRED_KEYS.join(", ")
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CollectionResult;
    use crate::sources::SourceContent;

    fn query() -> Query {
        Query::parse("Acme Corp").unwrap()
    }

    #[test]
    fn test_report_path_uses_file_stem() {
        let path = report_path(Path::new("out"), &query());
        assert_eq!(path, Path::new("out").join("report_acme_corp.md"));
        assert_eq!(
            json_path(Path::new("."), "insights", &query()),
            Path::new(".").join("insights_acme_corp.json")
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report {
            content: "# Research Report: Acme Corp\n".to_string(),
            sections: Vec::new(),
        };

        let path = write_report(dir.path(), &query(), &report).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), report.content);
    }

    #[tokio::test]
    async fn test_write_report_keeps_path_like_queries_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report {
            content: "# Research Report: AC/DC\n".to_string(),
            sections: Vec::new(),
        };

        for raw in ["AC/DC", "../escaped", "x/../../y", "Back\\Slash"] {
            let query = Query::parse(raw).unwrap();
            let path = write_report(dir.path(), &query, &report).await.unwrap();
            assert_eq!(path.parent(), Some(dir.path()), "query {raw:?}");
            assert!(path.is_file(), "query {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_saved_collection_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let collection = CollectionResult::new(query())
            .with_source("web_search", SourceContent::Text("hits".into()));

        let path = write_json(dir.path(), "collection", &query(), &collection)
            .await
            .unwrap();
        let value = read_collection(&path).await.unwrap();

        assert_eq!(value["sources"], serde_json::json!(["web_search"]));
    }

    #[tokio::test]
    async fn test_read_collection_rejects_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"query": "Acme Corp"}"#).unwrap();

        let err = read_collection(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
