//! # Report Assistant
//!
//! Conversational layer over a generated research report.
//!
//! - [`IntentClassifier`]: one small-model call per message, degrading to
//!   the general intent on any failure
//! - [`extract_edits`]: structured edit blocks out of free-form model text
//! - [`confidence`]: confidence levels from retrieval quality and extraction
//! - [`ExplainHandler`]: structured, non-streamed explanations
//! - [`ReportAssistant`]: per-intent routing and the streaming protocol

pub mod classifier;
pub mod confidence;
pub mod explain;
pub mod extractor;
pub mod prompts;
pub mod protocol;
pub mod router;
pub mod telemetry;

pub use classifier::{Classification, IntentClassifier, parse_intent};
pub use explain::{ExplainHandler, ExplainTarget, Explanation};
pub use extractor::{ExtractionOutcome, diff_preview, extract_edits};
pub use protocol::{EventWriter, encode_event, event_channel, parse_sse_body, sse_frame};
pub use router::{AssistantConfig, ChatReply, ReportAssistant};
