//! Chat and completion sessions against a workflow.
//!
//! Both modes share [`execute`]: build the request, call the gateway, fold the
//! answer (streamed or not) into one text and turn every failure into a
//! [`Notification`] instead of an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::accumulator::{Phase, StreamObserver, consume_stream};
use crate::errors::{HarnessError, RunFailure};
use crate::gateway::{ChatMessage, GatewayResponse, WorkflowGateway, WorkflowRunRequest};
use crate::run::AbortSignal;

/// Everything a submission needs, passed explicitly.
#[derive(Clone)]
pub struct PlaygroundContext {
    pub gateway: Arc<dyn WorkflowGateway>,
    pub token: Option<String>,
    pub workflow_app_id: String,
    pub model_id: String,
    pub stream: bool,
    pub system_prompt: Option<String>,
}

impl PlaygroundContext {
    /// Streaming context with no token and no system prompt.
    pub fn new(
        gateway: Arc<dyn WorkflowGateway>,
        workflow_app_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            token: None,
            workflow_app_id: workflow_app_id.into(),
            model_id: model_id.into(),
            stream: true,
            system_prompt: None,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.workflow_app_id.trim().is_empty() {
            return Err(HarnessError::Validation(
                "workflow app id must not be empty".into(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(HarnessError::Validation(
                "model id must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn system_message(&self) -> Option<ChatMessage> {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ChatMessage::system)
    }
}

impl std::fmt::Debug for PlaygroundContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaygroundContext")
            .field("workflow_app_id", &self.workflow_app_id)
            .field("model_id", &self.model_id)
            .field("stream", &self.stream)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

/// User-visible message raised during a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Error frame inside a stream. The stream kept going.
    UpstreamError { message: String },
    /// The stream broke mid-read.
    Transport { message: String },
    /// The gateway refused the request or answered with an error body.
    Gateway { message: String },
    Cancelled,
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Self::UpstreamError { message }
            | Self::Transport { message }
            | Self::Gateway { message } => message,
            Self::Cancelled => "request cancelled",
        }
    }
}

/// Final text of one submission plus what went wrong along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub text: String,
    pub phase: Phase,
    pub notifications: Vec<Notification>,
}

impl SubmissionOutcome {
    fn failed(notification: Notification) -> Self {
        Self {
            text: String::new(),
            phase: Phase::Aborted,
            notifications: vec![notification],
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.phase == Phase::Aborted
    }
}

/// Runs one request/response cycle.
///
/// Never fails: gateway, transport and upstream errors are reported through
/// `notifications`. A partially streamed answer is kept when the stream breaks.
pub async fn execute(
    ctx: &PlaygroundContext,
    messages: Vec<ChatMessage>,
    abort: &mut AbortSignal,
    observer: &mut dyn StreamObserver,
) -> SubmissionOutcome {
    if abort.is_cancelled() {
        return SubmissionOutcome::failed(Notification::Cancelled);
    }
    let request = WorkflowRunRequest {
        token: ctx.token.clone(),
        workflow_app_id: ctx.workflow_app_id.clone(),
        model_id: ctx.model_id.clone(),
        messages,
        stream: ctx.stream,
    };

    let response = tokio::select! {
        biased;
        _ = abort.cancelled() => return SubmissionOutcome::failed(Notification::Cancelled),
        response = ctx.gateway.run(request) => response,
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            info!(
                event = "playground.gateway_failed",
                workflow_app_id = %ctx.workflow_app_id,
                error = %err,
                "workflow run failed"
            );
            return SubmissionOutcome::failed(Notification::Gateway {
                message: err.to_string(),
            });
        }
    };

    match response {
        GatewayResponse::Json(body) => {
            if let Some(error) = body.error_message() {
                let text = format!("Error: {error}");
                observer.on_update(&text);
                return SubmissionOutcome {
                    text,
                    phase: Phase::Done,
                    notifications: vec![Notification::Gateway { message: error }],
                };
            }
            let text = body.response.unwrap_or_default();
            observer.on_update(&text);
            SubmissionOutcome {
                text,
                phase: Phase::Done,
                notifications: Vec::new(),
            }
        }
        GatewayResponse::Stream(stream) => {
            let outcome = consume_stream(stream, abort, observer).await;
            let mut notifications: Vec<Notification> = outcome
                .upstream_errors
                .into_iter()
                .map(|message| Notification::UpstreamError { message })
                .collect();
            match outcome.failure {
                Some(RunFailure::Cancelled) => notifications.push(Notification::Cancelled),
                Some(RunFailure::Transport { message }) => {
                    notifications.push(Notification::Transport { message })
                }
                None => {}
            }
            debug!(
                event = "playground.stream_done",
                phase = ?outcome.phase,
                notifications = notifications.len(),
                "submission finished"
            );
            SubmissionOutcome {
                text: outcome.text,
                phase: outcome.phase,
                notifications,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaygroundMode {
    /// Multi-turn: history is sent with every submission.
    Chat,
    /// Single prompt, no history.
    Completion,
}

/// One playground tab. A submission borrows the session mutably, so only one
/// can be in flight at a time.
#[derive(Debug)]
pub struct Playground {
    ctx: PlaygroundContext,
    mode: PlaygroundMode,
    history: Vec<ChatMessage>,
}

impl Playground {
    pub fn new(ctx: PlaygroundContext, mode: PlaygroundMode) -> Result<Self, HarnessError> {
        ctx.validate()?;
        Ok(Self {
            ctx,
            mode,
            history: Vec::new(),
        })
    }

    pub fn chat(ctx: PlaygroundContext) -> Result<Self, HarnessError> {
        Self::new(ctx, PlaygroundMode::Chat)
    }

    pub fn completion(ctx: PlaygroundContext) -> Result<Self, HarnessError> {
        Self::new(ctx, PlaygroundMode::Completion)
    }

    pub fn mode(&self) -> PlaygroundMode {
        self.mode
    }

    pub fn context(&self) -> &PlaygroundContext {
        &self.ctx
    }

    /// Prior turns (chat mode only).
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Messages that a submission of `input` would send.
    pub fn messages_for(&self, input: &str) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self.ctx.system_message().into_iter().collect();
        if self.mode == PlaygroundMode::Chat {
            messages.extend(self.history.iter().cloned());
        }
        messages.push(ChatMessage::user(input));
        messages
    }

    /// Sends `input` and returns the folded answer.
    ///
    /// In chat mode the user turn and a non-empty answer are appended to the
    /// history, partial answers included.
    pub async fn submit(
        &mut self,
        input: &str,
        abort: &mut AbortSignal,
        observer: &mut dyn StreamObserver,
    ) -> Result<SubmissionOutcome, HarnessError> {
        if input.trim().is_empty() {
            return Err(HarnessError::Validation("prompt must not be empty".into()));
        }
        let messages = self.messages_for(input);
        let outcome = execute(&self.ctx, messages, abort, observer).await;
        if self.mode == PlaygroundMode::Chat {
            self.history.push(ChatMessage::user(input));
            if !outcome.text.is_empty() {
                let answer = ChatMessage::assistant(outcome.text.clone());
                self.history.push(answer);
            }
        }
        Ok(outcome)
    }
}
