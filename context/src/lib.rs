//! Grounding context for the report assistant.
//!
//! Two paths produce the text a model answers from:
//!
//! 1. Retrieval: embed the query, fetch the best-matching chunks of the
//!    document and concatenate them with `[section › fieldPath]` provenance
//! 2. Summary: a deterministic per-section digest of the raw document,
//!    independent of the query
//!
//! The retrieval path is attempted only when a document id is supplied and
//! retrieval is enabled. Any failure, or an empty result, falls back to the
//! summary. [`ContextBuilder::build`] never fails.
//!
//! ```rust,ignore
//! use context::{ContextBuilder, ContextBuilderConfig};
//!
//! let builder = ContextBuilder::new(embedder, retriever, ContextBuilderConfig::default());
//! let context = builder.build("Why this positioning?", Some("doc-42"), &document).await;
//! println!("{} ({})", context.text, context.source);
//! ```

mod builder;
mod retriever;
mod summary;

pub use builder::{BuiltContext, ContextBuilder, ContextBuilderConfig, format_chunks};
pub use retriever::{HttpChunkRetriever, HttpChunkRetrieverConfig};
pub use summary::{EMPTY_DOCUMENT_SUMMARY, summarize_document};
