use context::BuiltContext;
use report_core::{Confidence, ConfidenceLevel};

use crate::extractor::ExtractionOutcome;

/// Confidence in an answer grounded by `context`.
///
/// Retrieval-grounded answers are scored by how many chunks matched and how
/// closely; summary-grounded answers are medium.
pub fn score_context(context: &BuiltContext) -> Confidence {
    if !context.is_rag() || context.chunks.is_empty() {
        return Confidence::new(
            ConfidenceLevel::Medium,
            "Answer is based on a summary of the report rather than matched passages."
        );
    }

    let count = context.chunks.len();
    let average =
        context.chunks.iter().map(|c| c.similarity).sum::<f32>() / count as f32;

    if count >= 3 && average >= 0.8 {
        Confidence::new(
            ConfidenceLevel::High,
            format!("{} closely matching report passages (average similarity {:.2}).", count, average)
        )
    } else if average >= 0.7 {
        Confidence::new(
            ConfidenceLevel::Medium,
            format!("{} relevant report passages (average similarity {:.2}).", count, average)
        )
    } else {
        Confidence::new(
            ConfidenceLevel::Low,
            format!("Only weakly matching report passages found (average similarity {:.2}).", average)
        )
    }
}

/// Adjusts `base` for the outcome of edit extraction.
pub fn score_edit(base: Confidence, outcome: &ExtractionOutcome) -> Confidence {
    if !outcome.edits.is_empty() {
        Confidence::new(
            ConfidenceLevel::High,
            format!("{} structured edit(s) proposed for review.", outcome.edits.len())
        )
    } else if outcome.parse_failed {
        Confidence::new(
            ConfidenceLevel::Low,
            "The proposed edit could not be read; review the response text before changing the report."
        )
    } else {
        base
    }
}

/// Quality of the best retrieved passage.
pub fn source_quality(context: &BuiltContext) -> Option<ConfidenceLevel> {
    let best = context.best_similarity()?;
    Some(if best >= 0.85 {
        ConfidenceLevel::High
    } else if best >= 0.75 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    })
}
