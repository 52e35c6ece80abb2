//! Client side of the agent studio: workflow runs with incremental stream
//! accumulation, plus the REST client for agents, workflows and provider keys.
//!
//! # Streaming a playground submission
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studio_core::StudioConfig;
//! use studio_harness::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let config = StudioConfig::from_env()?;
//! let gateway = Arc::new(HttpWorkflowGateway::new(&config)?);
//! let ctx = PlaygroundContext::new(gateway, "workflow-app-id", "gpt-4o-mini");
//!
//! let mut run = start_run(ctx, vec![ChatMessage::user("Say hello")]);
//! while let Some(event) = run.next_event().await {
//!     if let RunEvent::Updated { text, .. } = event {
//!         println!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// `data:` stream folding and its state machine.
pub mod accumulator;
mod decoder;
/// Public error types.
pub mod errors;
/// Stream frame classification.
pub mod frame;
/// Workflow gateway contract and HTTP client.
pub mod gateway;
/// Chat and completion sessions.
pub mod playground;
/// Common imports for typical usage.
pub mod prelude;
/// Spawned runs, event streams and cancellation.
pub mod run;
/// Agent and catalog REST client.
pub mod store;

pub use accumulator::{
    AccumulatorState, ChunkReport, Phase, StreamAccumulator, StreamObserver, StreamOutcome,
    consume_stream,
};
pub use errors::{GatewayError, HarnessError, RunFailure, StoreError};
pub use frame::{StreamFrame, classify_payload, classify_value};
pub use gateway::{
    ByteStream, ChatMessage, CompletionBody, GatewayResponse, HttpWorkflowGateway, MessageRole,
    WorkflowGateway, WorkflowRunRequest,
};
pub use playground::{
    Notification, Playground, PlaygroundContext, PlaygroundMode, SubmissionOutcome, execute,
};
pub use run::{AbortHandle, AbortSignal, RunEvent, RunStream, start_run};
pub use store::{AgentStore, ApiKeyStore, CatalogSource, HttpStudioApi, WorkflowStore};
