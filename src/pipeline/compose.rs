use std::fmt::{self, Write};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::dimension::{AnalysisDimension, DimensionResult, SUMMARY_FIELD};
use super::synthesize::InsightRecord;
use crate::error::AppResult;
use crate::events::{EventSink, PipelineEvent};

pub const REPORT_VERSION: &str = "1.0";

const SWOT_CATEGORIES: [&str; 4] = ["strengths", "weaknesses", "opportunities", "threats"];

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub content: String,
    /// Dimensions that got a section, in render order.
    pub sections: Vec<AnalysisDimension>,
}

impl Report {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Renders an [`InsightRecord`] as a Markdown report.
pub struct Composer {
    sink: Arc<dyn EventSink>,
}

impl Composer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Never fails: a rendering error is turned into a short error report.
    #[tracing::instrument(
        name = "pipeline_stage compose",
        skip(self, insights),
        fields(pipeline.stage = "compose", report.sections)
    )]
    pub fn compose(&self, query: &str, insights: &InsightRecord) -> Report {
        self.compose_into(String::new(), query, insights)
    }

    /// Renders into `out`. A write error from `out` yields the error report.
    fn compose_into<W>(&self, mut out: W, query: &str, insights: &InsightRecord) -> Report
    where
        W: Write + Into<String>,
    {
        match render(&mut out, query, insights) {
            Ok(sections) => {
                tracing::Span::current().record("report.sections", sections.len());
                self.sink.record(PipelineEvent::ReportComposed {
                    sections: sections.len(),
                });
                Report {
                    content: out.into(),
                    sections,
                }
            }
            Err(err) => {
                self.sink.record(PipelineEvent::CompositionFailed {
                    error: err.to_string(),
                });
                Report {
                    content: error_report(query, &err.to_string()),
                    sections: Vec::new(),
                }
            }
        }
    }
}

/// Writes the report and returns the dimensions that got a section.
fn render<W: Write>(
    out: &mut W,
    query: &str,
    insights: &InsightRecord,
) -> AppResult<Vec<AnalysisDimension>> {
    write!(
        out,
        "# Research Report: {query}\n\n\
         **Generated:** {}\n\
         **Sources Analyzed:** {}\n\
         **Report Version:** {REPORT_VERSION}\n\n\
         ---\n\n",
        insights.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        insights.sources_analyzed,
    )?;

    let mut sections = Vec::new();
    let mut bodies = Vec::new();
    for (dimension, result) in &insights.analysis {
        let body = section_body(*dimension, result)?;
        if !body.trim().is_empty() {
            sections.push(*dimension);
            bodies.push((*dimension, body));
        }
    }

    out.write_str("## Executive Summary\n\n")?;
    if let Some(error) = &insights.error {
        writeln!(out, "*Note: Analysis encountered an issue: {error}*\n")?;
    } else if sections.is_empty() {
        writeln!(
            out,
            "*Note: No analysis could be produced from the {} sources collected. \
             The report contains no analysis sections.*\n",
            insights.sources_analyzed
        )?;
    } else {
        let covered: Vec<&str> = sections.iter().map(|d| d.heading()).collect();
        writeln!(
            out,
            "This report provides an analysis of {query} based on {} sources. \
             It covers: {}.\n",
            insights.sources_analyzed,
            covered.join(", ")
        )?;
    }

    for (dimension, body) in bodies {
        writeln!(out, "## {}\n", dimension.heading())?;
        out.write_str(&body)?;
    }

    write!(
        out,
        "---\n\n\
         *Report generated by AI Research Agent v{REPORT_VERSION}*\n\
         *Run ID: {}*\n",
        insights.run_id
    )?;

    Ok(sections)
}

fn section_body(dimension: AnalysisDimension, result: &DimensionResult) -> AppResult<String> {
    let mut body = String::new();
    match (dimension, result) {
        (_, DimensionResult::Summary(text)) | (_, DimensionResult::Narrative { text, .. }) => {
            writeln!(body, "{}\n", text.trim_end())?;
        }
        (AnalysisDimension::Swot, DimensionResult::Structured(fields)) => {
            if let Some(only) = lone_summary(fields) {
                writeln!(body, "{}\n", display_value(only))?;
            } else {
                write_swot(&mut body, fields)?;
            }
        }
        (_, DimensionResult::Structured(fields)) => {
            if let Some(only) = lone_summary(fields) {
                writeln!(body, "{}\n", display_value(only))?;
            } else {
                for (key, value) in fields.iter().filter(|(key, _)| *key != SUMMARY_FIELD) {
                    writeln!(body, "**{}:** {}\n", title_case(key), display_value(value))?;
                }
            }
        }
    }
    Ok(body)
}

fn write_swot(body: &mut String, fields: &Map<String, Value>) -> fmt::Result {
    if SWOT_CATEGORIES
        .iter()
        .all(|category| swot_category(fields, category).is_none())
    {
        for (key, value) in fields {
            writeln!(body, "**{}:** {}\n", title_case(key), display_value(value))?;
        }
        return Ok(());
    }

    for category in SWOT_CATEGORIES {
        writeln!(body, "### {}", title_case(category))?;
        match swot_category(fields, category) {
            Some(Value::Array(items)) => {
                for item in items {
                    writeln!(body, "- {}", display_value(item))?;
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => writeln!(body, "{}", display_value(other))?,
        }
        body.push('\n');
    }
    Ok(())
}

/// Category lookup that tolerates `Strengths`, `THREATS` and stray spaces.
fn swot_category<'a>(fields: &'a Map<String, Value>, category: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(category))
        .map(|(_, value)| value)
}

fn lone_summary(fields: &Map<String, Value>) -> Option<&Value> {
    match fields.len() {
        1 => fields.get(SUMMARY_FIELD),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `investment_rating` -> `Investment Rating`.
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn error_report(query: &str, error: &str) -> String {
    format!(
        "# Error Report: {query}\n\n\
         **Status:** Analysis Failed\n\
         **Error:** {error}\n\
         **Generated:** {}\n\n\
         The analysis could not be completed due to the error mentioned above.\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use serde_json::json;

    fn record(analysis: Vec<(AnalysisDimension, DimensionResult)>) -> InsightRecord {
        let mut record = InsightRecord::failed("Acme Corp", 3, "unused");
        record.error = None;
        record.status = None;
        record.analysis = analysis.into_iter().collect();
        record
    }

    fn structured(value: Value) -> DimensionResult {
        match value {
            Value::Object(fields) => DimensionResult::Structured(fields),
            other => panic!("expected object, got {other}"),
        }
    }

    fn compose(insights: &InsightRecord) -> Report {
        Composer::new(Arc::new(MemorySink::new())).compose("Acme Corp", insights)
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("investment_rating"), "Investment Rating");
        assert_eq!(title_case("REVENUE"), "Revenue");
        assert_eq!(title_case("health"), "Health");
    }

    #[test]
    fn test_financial_renders_labeled_lines() {
        let insights = record(vec![(
            AnalysisDimension::Financial,
            structured(json!({
                "revenue": "Growing 8% a year",
                "profitability": "Thin margins",
                "health": "Low debt",
                "investment_rating": "Hold"
            })),
        )]);

        let report = compose(&insights);

        let labeled: Vec<&str> = report
            .content
            .lines()
            .filter(|line| line.starts_with("**") && line.contains(":** "))
            .filter(|line| !line.starts_with("**Generated") && !line.starts_with("**Sources") && !line.starts_with("**Report"))
            .collect();
        assert_eq!(
            labeled,
            vec![
                "**Revenue:** Growing 8% a year",
                "**Profitability:** Thin margins",
                "**Health:** Low debt",
                "**Investment Rating:** Hold",
            ]
        );
        assert_eq!(report.sections, vec![AnalysisDimension::Financial]);
    }

    #[test]
    fn test_financial_skips_summary_unless_alone() {
        let mixed = record(vec![(
            AnalysisDimension::Financial,
            structured(json!({"revenue": "up", "summary": "hidden"})),
        )]);
        assert!(!compose(&mixed).content.contains("hidden"));

        let alone = record(vec![(
            AnalysisDimension::Financial,
            DimensionResult::Summary("Revenue details were not disclosed.".into()),
        )]);
        assert!(compose(&alone).content.contains("## Financial Analysis\n\nRevenue details were not disclosed.\n"));
    }

    #[test]
    fn test_swot_sub_lists_and_scalar_category() {
        let insights = record(vec![(
            AnalysisDimension::Swot,
            structured(json!({
                "strengths": ["Brand", "Distribution"],
                "weaknesses": "Aging product line",
                "opportunities": ["Export"],
                "threats": []
            })),
        )]);

        let content = compose(&insights).content;

        assert!(content.contains("## SWOT Analysis\n\n### Strengths\n- Brand\n- Distribution\n\n"));
        assert!(content.contains("### Weaknesses\nAging product line\n\n"));
        assert!(content.contains("### Opportunities\n- Export\n\n"));
        assert!(content.contains("### Threats\n\n"));
    }

    #[test]
    fn test_swot_categories_match_any_case() {
        let insights = record(vec![(
            AnalysisDimension::Swot,
            structured(json!({
                "Strengths": ["Brand"],
                "WEAKNESSES": ["Cost"],
                " Opportunities ": ["Export"],
                "threats": ["Rivals"]
            })),
        )]);

        let content = compose(&insights).content;

        assert!(content.contains("### Strengths\n- Brand\n\n"));
        assert!(content.contains("### Weaknesses\n- Cost\n\n"));
        assert!(content.contains("### Opportunities\n- Export\n\n"));
        assert!(content.contains("### Threats\n- Rivals\n\n"));
    }

    #[test]
    fn test_swot_without_categories_renders_fields() {
        let insights = record(vec![(
            AnalysisDimension::Swot,
            structured(json!({"pros": ["Brand"], "cons": "Thin margins"})),
        )]);

        let report = compose(&insights);

        assert!(!report.content.contains("### Strengths"));
        assert!(report.content.contains("**Pros:** [\"Brand\"]\n"));
        assert!(report.content.contains("**Cons:** Thin margins\n"));
        assert_eq!(report.sections, vec![AnalysisDimension::Swot]);
    }

    /// Refuses writes once `capacity` bytes are buffered.
    struct BoundedBuffer {
        written: String,
        capacity: usize,
    }

    impl Write for BoundedBuffer {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.written.len() + s.len() > self.capacity {
                return Err(fmt::Error);
            }
            self.written.push_str(s);
            Ok(())
        }
    }

    impl From<BoundedBuffer> for String {
        fn from(buffer: BoundedBuffer) -> Self {
            buffer.written
        }
    }

    #[test]
    fn test_write_failure_yields_error_report() {
        let sink = Arc::new(MemorySink::new());
        let composer = Composer::new(sink.clone());
        let buffer = BoundedBuffer {
            written: String::new(),
            capacity: 64,
        };

        let report = composer.compose_into(buffer, "Acme Corp", &record(vec![]));

        assert!(report.content.starts_with("# Error Report: Acme Corp\n\n**Status:** Analysis Failed\n**Error:** Compose error: "));
        assert!(report.sections.is_empty());
        assert!(matches!(
            sink.events().as_slice(),
            [PipelineEvent::CompositionFailed { .. }]
        ));
    }

    #[test]
    fn test_narrative_sections_in_fixed_order() {
        let insights = record(vec![
            (
                AnalysisDimension::Predictions,
                DimensionResult::Narrative {
                    field: "outlook".into(),
                    text: "Growth ahead.".into(),
                },
            ),
            (
                AnalysisDimension::History,
                DimensionResult::Narrative {
                    field: "timeline".into(),
                    text: "Founded 1947.".into(),
                },
            ),
        ]);

        let report = compose(&insights);

        let history = report.content.find("## History & Background").unwrap();
        let outlook = report.content.find("## Future Outlook & Recommendations").unwrap();
        assert!(history < outlook);
        assert!(!report.content.contains("## Financial Analysis"));
        assert!(!report.content.contains("## Industry & Market Analysis"));
        assert!(!report.content.contains("## SWOT Analysis"));
        assert_eq!(
            report.sections,
            vec![AnalysisDimension::History, AnalysisDimension::Predictions]
        );
    }

    #[test]
    fn test_empty_analysis_is_header_summary_footer() {
        let report = compose(&record(vec![]));

        assert!(report.content.starts_with("# Research Report: Acme Corp\n\n**Generated:** "));
        assert!(report.content.contains("**Sources Analyzed:** 3\n**Report Version:** 1.0\n"));
        assert!(report.content.contains("## Executive Summary\n\n*Note: No analysis could be produced"));
        assert_eq!(report.content.matches("\n## ").count(), 1);
        assert!(report.content.contains("*Report generated by AI Research Agent v1.0*"));
        assert!(report.sections.is_empty());
    }

    #[test]
    fn test_error_record_notes_issue() {
        let insights = InsightRecord::failed("Acme Corp", 0, "Synthesis error: bad input");
        let report = compose(&insights);
        assert!(report.content.contains(
            "*Note: Analysis encountered an issue: Synthesis error: bad input*"
        ));
        assert!(report.sections.is_empty());
    }

    #[test]
    fn test_empty_structured_result_gets_no_heading() {
        let insights = record(vec![(
            AnalysisDimension::Financial,
            DimensionResult::Structured(Map::new()),
        )]);
        let report = compose(&insights);
        assert!(!report.content.contains("## Financial Analysis"));
        assert!(report.sections.is_empty());
    }

    #[test]
    fn test_compose_records_event() {
        let sink = Arc::new(MemorySink::new());
        let composer = Composer::new(sink.clone());
        composer.compose("Acme Corp", &record(vec![]));
        assert_eq!(sink.events(), vec![PipelineEvent::ReportComposed { sections: 0 }]);
    }

    #[test]
    fn test_error_report_shape() {
        let report = error_report("Acme Corp", "formatter failed");
        assert!(report.starts_with("# Error Report: Acme Corp\n\n**Status:** Analysis Failed\n**Error:** formatter failed\n**Generated:** "));
    }
}
