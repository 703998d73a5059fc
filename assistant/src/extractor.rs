//! Structured edit block extraction.
//!
//! Generation under the edit prompt produces prose followed by a JSON block
//! marked `"isEdit": true`, either fenced or bare, in one of two shapes:
//!
//! ```json
//! {"isEdit": true, "section": "...", "fieldPath": "...", "oldValue": ..., "newValue": ..., "explanation": "..."}
//! {"isEdit": true, "edits": [{"section": "...", "fieldPath": "...", ...}]}
//! ```
//!
//! Extraction never fails outward. A block that cannot be parsed yields no
//! edits and leaves the text untouched; the caller downgrades confidence.

use std::sync::LazyLock;

use errors::ExtractionError;
use regex::Regex;
use report_core::PendingEdit;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const MAX_PREVIEW_CHARS: usize = 100;
pub(crate) const MARKER: &str = "\"isEdit\"";

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z]*)[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionOutcome {
    pub edits: Vec<PendingEdit>,
    /// Prose with the edit block removed when edits were extracted;
    /// otherwise the input text unchanged.
    pub text: String,
    /// A candidate edit block was present
    pub block_found: bool,
    /// The candidate block could not be turned into any edit
    pub parse_failed: bool
}

struct Candidate<'a> {
    /// Byte range of the whole block, fences included
    start: usize,
    end: usize,
    body: &'a str
}

pub fn extract_edits(text: &str) -> ExtractionOutcome {
    let unchanged = |block_found: bool, parse_failed: bool| ExtractionOutcome {
        edits: Vec::new(),
        text: text.to_string(),
        block_found,
        parse_failed
    };

    let mut unusable = None;
    for candidate in candidates(text) {
        match parse_block(candidate.body) {
            Ok(edits) => {
                debug!(edits = edits.len(), "Extracted pending edits");
                return ExtractionOutcome {
                    edits,
                    text: strip_block(text, &candidate),
                    block_found: true,
                    parse_failed: false
                };
            }
            Err(ExtractionError::MissingMarker) => {}
            Err(e) => {
                unusable.get_or_insert(e);
            }
        }
    }

    match unusable {
        Some(e) => {
            warn!(error = %e, "Discarding unusable edit block");
            unchanged(true, true)
        }
        None => unchanged(false, false)
    }
}

fn strip_block(text: &str, candidate: &Candidate<'_>) -> String {
    let mut prose = String::with_capacity(text.len());
    prose.push_str(text[..candidate.start].trim_end());
    let rest = text[candidate.end..].trim();
    if !rest.is_empty() {
        prose.push_str("\n\n");
        prose.push_str(rest);
    }
    prose.trim().to_string()
}

/// Fenced blocks carrying the marker, in order of appearance. A bare
/// object is only considered when no fence carries the marker.
fn candidates(text: &str) -> Vec<Candidate<'_>> {
    let fenced: Vec<Candidate<'_>> = FENCE
        .captures_iter(text)
        .filter_map(|caps| {
            let (whole, lang, body) = (caps.get(0)?, caps.get(1)?, caps.get(2)?);
            let body = body.as_str().trim();
            is_edit_fence(lang.as_str(), body).then_some(Candidate {
                start: whole.start(),
                end: whole.end(),
                body
            })
        })
        .collect();
    if !fenced.is_empty() {
        return fenced;
    }

    bare_candidate(text).into_iter().collect()
}

fn bare_candidate(text: &str) -> Option<Candidate<'_>> {
    let marker = text.find(MARKER)?;
    let start = text[..marker].rfind('{')?;
    let end = text.rfind('}').filter(|end| *end > marker)? + 1;
    Some(Candidate {
        start,
        end,
        body: &text[start..end]
    })
}

/// A fence holds an edit block when it is untagged or tagged `json` and
/// its body mentions the marker key.
pub(crate) fn is_edit_fence(lang: &str, body: &str) -> bool {
    (lang.is_empty() || lang.eq_ignore_ascii_case("json")) && body.contains(MARKER)
}

/// Whether the text after an opening brace starts the marker key.
///
/// `None` while `after` is still too short to tell.
pub(crate) fn opens_bare_block(after: &str) -> Option<bool> {
    let after = after.trim_start();
    if after.len() >= MARKER.len() {
        Some(after.starts_with(MARKER))
    } else if MARKER.starts_with(after) {
        None
    } else {
        Some(false)
    }
}

fn parse_block(body: &str) -> Result<Vec<PendingEdit>, ExtractionError> {
    let value: Value = serde_json::from_str(body).map_err(|e| ExtractionError::MalformedBlock {
        reason: e.to_string()
    })?;
    let Value::Object(block) = value else {
        return Err(ExtractionError::MalformedBlock {
            reason: "edit block is not a JSON object".to_string()
        });
    };
    if !is_marked(&block) {
        return Err(ExtractionError::MissingMarker);
    }

    let block_explanation = string_field(&block, "explanation").unwrap_or_default();
    let candidates: Vec<&Map<String, Value>> = match block.get("edits") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(_) => {
            return Err(ExtractionError::MalformedBlock {
                reason: "edits is not an array".to_string()
            });
        }
        None => vec![&block]
    };

    let edits: Vec<PendingEdit> = candidates
        .into_iter()
        .filter_map(|candidate| to_pending_edit(candidate, &block_explanation))
        .collect();

    if edits.is_empty() {
        return Err(ExtractionError::NoUsableEdits);
    }
    Ok(edits)
}

fn is_marked(block: &Map<String, Value>) -> bool {
    match block.get("isEdit") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        _ => false
    }
}

/// Candidates missing a section or field path are dropped individually.
fn to_pending_edit(candidate: &Map<String, Value>, fallback_explanation: &str) -> Option<PendingEdit> {
    let section = string_field(candidate, "section")?;
    let field_path =
        string_field(candidate, "fieldPath").or_else(|| string_field(candidate, "field"))?;
    let old_value = candidate.get("oldValue").cloned().unwrap_or(Value::Null);
    let new_value = candidate.get("newValue").cloned().unwrap_or(Value::Null);
    let explanation =
        string_field(candidate, "explanation").unwrap_or_else(|| fallback_explanation.to_string());

    Some(PendingEdit {
        diff_preview: diff_preview(&old_value, &new_value),
        section,
        field_path,
        old_value,
        new_value,
        explanation
    })
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Two-line preview: `- Old: ...` then `+ New: ...`.
pub fn diff_preview(old_value: &Value, new_value: &Value) -> String {
    format!(
        "- Old: {}\n+ New: {}",
        preview_value(old_value),
        preview_value(new_value)
    )
}

fn preview_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let shown = match s.char_indices().nth(MAX_PREVIEW_CHARS) {
                Some((idx, _)) => format!("{}...", &s[..idx]),
                None => s.clone()
            };
            format!("\"{}\"", shown)
        }
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string()
    }
}
