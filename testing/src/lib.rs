//! Shared test fixtures for the report assistant workspace.
//!
//! Provides:
//! - A representative strategy report document
//! - In-process doubles for the retrieval collaborators
//!   ([`StaticRetriever`], [`FailingRetriever`], [`StaticEmbedder`])
//! - [`MockGateway`], a scripted model gateway, and [`ManualClock`]

mod clock;
mod doubles;
mod fixtures;
mod mock_gateway;

pub use clock::ManualClock;
pub use doubles::*;
pub use fixtures::*;
pub use mock_gateway::MockGateway;
