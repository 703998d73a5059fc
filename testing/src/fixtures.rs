use std::sync::atomic::{AtomicU32, Ordering};

use report_core::ContextChunk;
use serde_json::{Value, json};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_document_id() -> String {
    unique_id("test-report")
}

/// A small strategy report with every canonical section populated.
pub fn sample_report() -> Value {
    json!({
        "executiveSummary": {
            "overview": "Acme sells workflow automation to mid-market logistics firms.",
            "keyFindings": ["Churn is concentrated in year one", "SMB demand is rising"]
        },
        "marketAnalysis": {
            "marketSize": "$4.2B",
            "growthRate": "12% CAGR",
            "segments": ["Mid-market", "Enterprise", "SMB"]
        },
        "competitiveAnalysis": {
            "competitors": [
                {"name": "FlowCo", "share": 0.31},
                {"name": "Routely", "share": 0.18}
            ]
        },
        "positioning": {
            "statement": "The fastest way for logistics teams to automate dispatch.",
            "targetCustomer": "Operations leads at 50-500 person carriers"
        },
        "recommendations": {
            "priorities": ["Expand SMB tier", "Invest in onboarding"],
            "timeline": "Two quarters"
        }
    })
}

pub fn chunk(section: &str, field_path: &str, similarity: f32, text: &str) -> ContextChunk {
    ContextChunk {
        section: section.to_string(),
        field_path: field_path.to_string(),
        similarity,
        text: text.to_string()
    }
}

/// Three well-matched chunks from the sample report.
pub fn sample_chunks() -> Vec<ContextChunk> {
    vec![
        chunk(
            "positioning",
            "statement",
            0.91,
            "The fastest way for logistics teams to automate dispatch."
        ),
        chunk(
            "positioning",
            "targetCustomer",
            0.84,
            "Operations leads at 50-500 person carriers"
        ),
        chunk("marketAnalysis", "segments", 0.78, "Mid-market, Enterprise, SMB"),
    ]
}
