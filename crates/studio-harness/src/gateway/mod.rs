//! Workflow gateway contract and its reqwest client.

use std::pin::Pin;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

mod http;

pub use http::HttpWorkflowGateway;

/// Raw response body chunks of a streamed workflow run.
pub type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<Bytes, GatewayError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One chat turn sent to a workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// A single workflow invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowRunRequest {
    /// Credential forwarded as a bearer token. Blank means no header.
    pub token: Option<String>,
    pub workflow_app_id: String,
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Body of a non-streaming workflow response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CompletionBody {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl CompletionBody {
    /// Error text when the body carries a non-null `error`.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|e| !e.is_null())?;
        let text = match error {
            serde_json::Value::String(s) => s.clone(),
            other => other
                .get("detail")
                .or_else(|| other.get("message"))
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| other.to_string()),
        };
        Some(text)
    }
}

/// What the gateway answered with.
pub enum GatewayResponse {
    /// `data:`-framed body, read incrementally.
    Stream(ByteStream),
    /// Single JSON body.
    Json(CompletionBody),
}

impl std::fmt::Debug for GatewayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("GatewayResponse::Stream(..)"),
            Self::Json(body) => f.debug_tuple("GatewayResponse::Json").field(body).finish(),
        }
    }
}

/// Remote service that executes a workflow.
///
/// Streaming requests may still be answered with [`GatewayResponse::Json`]
/// when the upstream chose not to stream.
#[async_trait::async_trait]
pub trait WorkflowGateway: Send + Sync {
    async fn run(&self, request: WorkflowRunRequest) -> Result<GatewayResponse, GatewayError>;
}
