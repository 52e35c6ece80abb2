//! Common imports for typical harness usage.
pub use crate::accumulator::{Phase, StreamObserver};
pub use crate::errors::HarnessError;
pub use crate::gateway::{ChatMessage, HttpWorkflowGateway, WorkflowGateway};
pub use crate::playground::{Notification, Playground, PlaygroundContext, SubmissionOutcome};
pub use crate::run::{AbortHandle, AbortSignal, RunEvent, RunStream, start_run};
pub use crate::store::{AgentStore, ApiKeyStore, CatalogSource, HttpStudioApi, WorkflowStore};
