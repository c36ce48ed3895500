//! The five analytical dimensions and how each one prompts and parses.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Field name used when a structured reply could not be parsed.
pub const SUMMARY_FIELD: &str = "summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDimension {
    Financial,
    History,
    Industry,
    Swot,
    Predictions,
}

/// How a dimension's reply is turned into a [`DimensionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Expect a JSON object, fall back to a `summary` field.
    Structured,
    /// Keep the reply verbatim under the given field.
    Narrative(&'static str),
}

impl AnalysisDimension {
    /// Fixed analysis and rendering order.
    pub const ALL: [AnalysisDimension; 5] = [
        AnalysisDimension::Financial,
        AnalysisDimension::History,
        AnalysisDimension::Industry,
        AnalysisDimension::Swot,
        AnalysisDimension::Predictions,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AnalysisDimension::Financial => "financial",
            AnalysisDimension::History => "history",
            AnalysisDimension::Industry => "industry",
            AnalysisDimension::Swot => "swot",
            AnalysisDimension::Predictions => "predictions",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            AnalysisDimension::Financial => "Financial Analysis",
            AnalysisDimension::History => "History & Background",
            AnalysisDimension::Industry => "Industry & Market Analysis",
            AnalysisDimension::Swot => "SWOT Analysis",
            AnalysisDimension::Predictions => "Future Outlook & Recommendations",
        }
    }

    pub fn shape(self) -> ResultShape {
        match self {
            AnalysisDimension::Financial | AnalysisDimension::Swot => ResultShape::Structured,
            AnalysisDimension::History => ResultShape::Narrative("timeline"),
            AnalysisDimension::Industry => ResultShape::Narrative("market_analysis"),
            AnalysisDimension::Predictions => ResultShape::Narrative("outlook"),
        }
    }

    /// Instruction block appended to the shared context.
    pub fn instruction(self) -> &'static str {
        match self {
            AnalysisDimension::Financial => {
                "Based on the above information, provide a detailed financial analysis including:\n\
                 - Revenue trends\n\
                 - Profitability metrics\n\
                 - Financial health indicators\n\
                 - Investment potential\n\n\
                 Format as a single JSON object with the keys: revenue, profitability, health, investment_rating. \
                 Each value must be a short string. Return only the JSON object."
            }
            AnalysisDimension::History => {
                "Provide a historical analysis including:\n\
                 - Key milestones\n\
                 - Evolution over time\n\
                 - Major achievements\n\
                 - Turning points\n\n\
                 Format as a detailed narrative."
            }
            AnalysisDimension::Industry => {
                "Analyze the industry and market including:\n\
                 - Industry trends\n\
                 - Market position\n\
                 - Competitive landscape\n\
                 - Growth opportunities\n\n\
                 Format as a structured analysis."
            }
            AnalysisDimension::Swot => {
                "Perform a SWOT analysis providing:\n\
                 - Strengths (at least 3)\n\
                 - Weaknesses (at least 3)\n\
                 - Opportunities (at least 3)\n\
                 - Threats (at least 3)\n\n\
                 Format as a single JSON object with the keys strengths, weaknesses, opportunities, threats, \
                 each an array of strings. Return only the JSON object."
            }
            AnalysisDimension::Predictions => {
                "Based on the analysis, provide:\n\
                 - Future outlook (next 1-3 years)\n\
                 - Key growth drivers\n\
                 - Risk factors\n\
                 - Strategic recommendations\n\n\
                 Format as structured predictions."
            }
        }
    }

    pub fn prompt(self, context: &str) -> String {
        format!("{context}\n\n{}", self.instruction())
    }

    /// Turns a backend reply into this dimension's result. `None` means the
    /// reply is unusable and the dimension should be left out.
    pub fn parse(self, reply: &str) -> Option<DimensionResult> {
        if reply.trim().is_empty() {
            return None;
        }

        match self.shape() {
            ResultShape::Narrative(field) => Some(DimensionResult::Narrative {
                field: field.to_string(),
                text: reply.to_string(),
            }),
            ResultShape::Structured => {
                match serde_json::from_str::<Value>(&extract_json(reply)) {
                    Ok(Value::Object(fields)) if fields.is_empty() => None,
                    Ok(Value::Object(fields)) => Some(DimensionResult::Structured(fields)),
                    _ => Some(DimensionResult::Summary(reply.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for AnalysisDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A successful dimension's content.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionResult {
    /// Fields parsed from the backend's JSON reply, in reply order.
    Structured(Map<String, Value>),
    /// Structured parse failed; the raw reply is kept as a summary.
    Summary(String),
    /// Free text stored under the dimension's field name.
    Narrative { field: String, text: String },
}

impl DimensionResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DimensionResult::Summary(_))
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        match self {
            DimensionResult::Structured(fields) => fields.get(field).cloned(),
            DimensionResult::Summary(text) if field == SUMMARY_FIELD => {
                Some(Value::String(text.clone()))
            }
            DimensionResult::Narrative { field: name, text } if name == field => {
                Some(Value::String(text.clone()))
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DimensionResult::Structured(fields) => Value::Object(fields.clone()),
            DimensionResult::Summary(text) => {
                let mut map = Map::new();
                map.insert(SUMMARY_FIELD.to_string(), Value::String(text.clone()));
                Value::Object(map)
            }
            DimensionResult::Narrative { field, text } => {
                let mut map = Map::new();
                map.insert(field.clone(), Value::String(text.clone()));
                Value::Object(map)
            }
        }
    }
}

impl Serialize for DimensionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DimensionResult::Structured(fields) => fields.serialize(serializer),
            DimensionResult::Summary(text) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(SUMMARY_FIELD, text)?;
                map.end()
            }
            DimensionResult::Narrative { field, text } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(field, text)?;
                map.end()
            }
        }
    }
}

/// Pulls a JSON payload out of a reply that may wrap it in a fenced code block
/// or surrounding prose.
pub(crate) fn extract_json(content: &str) -> String {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim().to_string();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
        && start < end
    {
        return content[start..=end].to_string();
    }
    content.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_is_in_declaration_order() {
        let mut sorted = AnalysisDimension::ALL;
        sorted.sort();
        assert_eq!(sorted, AnalysisDimension::ALL);
        let keys: Vec<&str> = AnalysisDimension::ALL.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["financial", "history", "industry", "swot", "predictions"]);
    }

    #[test]
    fn test_serde_key_matches_key() {
        for dimension in AnalysisDimension::ALL {
            let value = serde_json::to_value(dimension).unwrap();
            assert_eq!(value, json!(dimension.key()));
        }
    }

    #[test]
    fn test_prompt_appends_instruction_to_context() {
        let prompt = AnalysisDimension::Swot.prompt("CONTEXT");
        assert!(prompt.starts_with("CONTEXT\n\n"));
        assert!(prompt.contains("Strengths (at least 3)"));
    }

    #[test]
    fn test_extract_json_markdown_block() {
        let input = "Here is the analysis:\n```json\n{\"revenue\": \"up\"}\n```\nDone.";
        assert_eq!(extract_json(input), "{\"revenue\": \"up\"}");
    }

    #[test]
    fn test_extract_json_generic_code_block() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_json_embedded_in_text() {
        let input = "The result is {\"a\": 1} and that's it.";
        assert_eq!(extract_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_no_json() {
        let input = "No JSON here } at all {";
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn test_parse_financial_object() {
        let reply = r#"{"revenue": "growing", "profitability": "positive", "health": "stable", "investment_rating": "buy"}"#;
        let result = AnalysisDimension::Financial.parse(reply).unwrap();
        let DimensionResult::Structured(fields) = &result else {
            panic!("expected structured result");
        };
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["revenue", "profitability", "health", "investment_rating"]);
        assert_eq!(result.get("investment_rating"), Some(json!("buy")));
    }

    #[test]
    fn test_parse_structured_falls_back_to_summary() {
        let reply = "Acme shows strong brand recognition but thin margins.";
        let result = AnalysisDimension::Swot.parse(reply).unwrap();
        assert!(result.is_fallback());
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"summary": reply}));
    }

    #[test]
    fn test_parse_structured_non_object_json_is_summary() {
        let result = AnalysisDimension::Financial.parse("[1, 2, 3]").unwrap();
        assert_eq!(result, DimensionResult::Summary("[1, 2, 3]".to_string()));
    }

    #[test]
    fn test_parse_empty_object_is_unusable() {
        assert_eq!(AnalysisDimension::Financial.parse("{}"), None);
    }

    #[test]
    fn test_parse_blank_reply_is_unusable() {
        for dimension in AnalysisDimension::ALL {
            assert_eq!(dimension.parse("  \n"), None);
        }
    }

    #[test]
    fn test_parse_narrative_fields() {
        let cases = [
            (AnalysisDimension::History, "timeline"),
            (AnalysisDimension::Industry, "market_analysis"),
            (AnalysisDimension::Predictions, "outlook"),
        ];
        for (dimension, field) in cases {
            let result = dimension.parse("{\"looks\": \"like json\"}").unwrap();
            assert_eq!(
                serde_json::to_value(&result).unwrap(),
                json!({ field: "{\"looks\": \"like json\"}" })
            );
        }
    }
}
