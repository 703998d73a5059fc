use serde_json::{Map, Value};

/// Returned for documents with no renderable sections.
pub const EMPTY_DOCUMENT_SUMMARY: &str = "No document content is available.";

/// Research-report sections, in the order they are rendered.
const KNOWN_SECTIONS: &[&str] = &[
    "executiveSummary",
    "companyOverview",
    "marketAnalysis",
    "competitiveAnalysis",
    "customerInsights",
    "positioning",
    "crossAnalysisSynthesis",
    "recommendations"
];

const MAX_STRING_CHARS: usize = 400;
const MAX_ARRAY_ITEMS: usize = 5;

/// Deterministic per-section digest of a report document.
///
/// Known sections come first in canonical order, then any other
/// object-valued sections alphabetically. The output depends only on the
/// document, never on the query.
pub fn summarize_document(document: &Value) -> String {
    let Some(root) = document.as_object() else {
        return EMPTY_DOCUMENT_SUMMARY.to_string();
    };

    let mut blocks = Vec::new();
    for key in KNOWN_SECTIONS {
        if let Some(value) = root.get(*key) {
            if let Some(block) = render_section(key, value) {
                blocks.push(block);
            }
        }
    }

    let mut others: Vec<(&String, &Value)> = root
        .iter()
        .filter(|(key, value)| !KNOWN_SECTIONS.contains(&key.as_str()) && value.is_object())
        .collect();
    others.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in others {
        if let Some(block) = render_section(key, value) {
            blocks.push(block);
        }
    }

    if blocks.is_empty() {
        EMPTY_DOCUMENT_SUMMARY.to_string()
    } else {
        blocks.join("\n\n")
    }
}

fn render_section(key: &str, value: &Value) -> Option<String> {
    let heading = format!("## {} ({})", title_case(key), key);
    match value {
        Value::Null => None,
        Value::Object(fields) => {
            let lines = render_fields(fields);
            if lines.is_empty() {
                None
            } else {
                Some(format!("{}\n{}", heading, lines.join("\n")))
            }
        }
        other => Some(format!("{}\n{}", heading, render_inline(other)))
    }
}

fn render_fields(fields: &Map<String, Value>) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| match value {
            Value::Object(nested) => {
                let mut lines = vec![format!("- {}:", name)];
                lines.extend(
                    nested
                        .iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| format!("  - {}: {}", k, render_flat(v)))
                );
                lines.join("\n")
            }
            other => format!("- {}: {}", name, render_inline(other))
        })
        .collect()
}

/// Renders a field value with arrays expanded.
fn render_inline(value: &Value) -> String {
    match value {
        Value::Array(items) => render_array(items),
        other => render_flat(other)
    }
}

/// Renders a value without descending further into objects.
fn render_flat(value: &Value) -> String {
    match value {
        Value::String(s) => truncate(s, MAX_STRING_CHARS),
        Value::Array(items) => render_array(items),
        Value::Object(map) => format!("{{{} fields}}", map.len()),
        Value::Null => String::new(),
        other => other.to_string()
    }
}

fn render_array(items: &[Value]) -> String {
    let shown: Vec<String> = items
        .iter()
        .take(MAX_ARRAY_ITEMS)
        .map(|item| match item {
            Value::Object(map) => compact_object(map),
            Value::Array(inner) => format!("[{} items]", inner.len()),
            other => render_flat(other)
        })
        .collect();
    let mut out = shown.join("; ");
    if items.len() > MAX_ARRAY_ITEMS {
        out.push_str(&format!(" (+{} more)", items.len() - MAX_ARRAY_ITEMS));
    }
    out
}

fn compact_object(map: &Map<String, Value>) -> String {
    let parts: Vec<String> = map
        .iter()
        .filter(|(_, v)| !v.is_null() && !v.is_object() && !v.is_array())
        .map(|(k, v)| format!("{}: {}", k, render_flat(v)))
        .collect();
    parts.join(", ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string()
    }
}

/// `crossAnalysisSynthesis` -> `Cross Analysis Synthesis`
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            out.push(' ');
            out.push(ch);
        } else if ch == '_' {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use testing::sample_report;

    #[test]
    fn test_known_sections_in_canonical_order() {
        let summary = summarize_document(&sample_report());
        let exec = summary.find("executiveSummary").unwrap();
        let market = summary.find("(marketAnalysis)").unwrap();
        let positioning = summary.find("(positioning)").unwrap();
        let recs = summary.find("(recommendations)").unwrap();
        assert!(exec < market && market < positioning && positioning < recs);
        assert!(summary.contains("## Executive Summary (executiveSummary)"));
        assert!(summary.contains("- marketSize: $4.2B"));
    }

    #[test]
    fn test_unknown_sections_follow_alphabetically() {
        let document = json!({
            "zeta": {"note": "last"},
            "alpha": {"note": "first"},
            "positioning": {"statement": "Lead"},
            "version": 3
        });
        let summary = summarize_document(&document);
        let positioning = summary.find("(positioning)").unwrap();
        let alpha = summary.find("(alpha)").unwrap();
        let zeta = summary.find("(zeta)").unwrap();
        assert!(positioning < alpha && alpha < zeta);
        assert!(!summary.contains("version"));
    }

    #[test]
    fn test_long_strings_are_truncated() {
        let long = "x".repeat(450);
        let summary = summarize_document(&json!({"positioning": {"statement": long}}));
        assert!(summary.contains(&format!("{}...", "x".repeat(400))));
        assert!(!summary.contains(&"x".repeat(401)));
    }

    #[test]
    fn test_arrays_are_capped_with_remainder_marker() {
        let summary =
            summarize_document(&json!({"marketAnalysis": {"segments": [1, 2, 3, 4, 5, 6, 7]}}));
        assert!(summary.contains("- segments: 1; 2; 3; 4; 5 (+2 more)"));
    }

    #[test]
    fn test_nested_objects_render_one_level() {
        let document = json!({
            "positioning": {
                "pillars": {"speed": "Dispatch in minutes", "deep": {"hidden": true}}
            }
        });
        let summary = summarize_document(&document);
        assert!(summary.contains("  - speed: Dispatch in minutes"));
        assert!(summary.contains("  - deep: {1 fields}"));
        assert!(!summary.contains("hidden"));
    }

    #[test]
    fn test_array_of_objects_compacted() {
        let summary = summarize_document(&sample_report());
        assert!(summary.contains("name: FlowCo, share: 0.31"));
    }

    #[test]
    fn test_non_object_documents_yield_placeholder() {
        assert_eq!(summarize_document(&json!("text")), EMPTY_DOCUMENT_SUMMARY);
        assert_eq!(summarize_document(&Value::Null), EMPTY_DOCUMENT_SUMMARY);
        assert_eq!(summarize_document(&json!({})), EMPTY_DOCUMENT_SUMMARY);
    }

    #[test]
    fn test_summary_is_deterministic() {
        let report = sample_report();
        assert_eq!(summarize_document(&report), summarize_document(&report));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("crossAnalysisSynthesis"), "Cross Analysis Synthesis");
        assert_eq!(title_case("market_analysis"), "Market analysis");
    }
}
