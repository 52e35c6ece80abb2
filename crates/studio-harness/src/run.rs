use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::accumulator::StreamObserver;
use crate::errors::HarnessError;
use crate::gateway::ChatMessage;
use crate::playground::{Notification, PlaygroundContext, SubmissionOutcome, execute};

/// Handle used to request cancellation of an in-flight submission.
///
/// Aborting drops the response body stream, which closes the connection.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A receiver observing this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of an [`AbortHandle`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pending forever if the handle
    /// is dropped without aborting.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Events emitted by a spawned run, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEvent {
    Started {
        run_id: uuid::Uuid,
    },
    /// Full buffer after a chunk changed it.
    Updated {
        run_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    Notice {
        run_id: uuid::Uuid,
        notification: Notification,
    },
    /// Terminal event.
    Finished {
        run_id: uuid::Uuid,
        outcome: SubmissionOutcome,
    },
}

/// Streaming handle returned by [`start_run`].
///
/// Use `next_event()` to consume events as they arrive and `finish()` to obtain
/// the outcome after the terminal event.
pub struct RunStream {
    run_id: uuid::Uuid,
    rx: mpsc::UnboundedReceiver<RunEvent>,
    final_rx: oneshot::Receiver<SubmissionOutcome>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Returns `None` after the terminal event has been consumed.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        let event = self.rx.recv().await;
        if let Some(RunEvent::Finished { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events and returns the outcome.
    pub async fn finish(mut self) -> Result<SubmissionOutcome, HarnessError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(RunEvent::Finished { .. }) => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }
        self.final_rx.await.map_err(|_| {
            HarnessError::protocol_msg(format!("run {} ended without an outcome", self.run_id))
        })
    }
}

/// Spawns a submission on the current tokio runtime.
pub fn start_run(ctx: PlaygroundContext, messages: Vec<ChatMessage>) -> RunStream {
    let run_id = uuid::Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    let (final_tx, final_rx) = oneshot::channel();
    let abort_handle = AbortHandle::new();
    let signal = abort_handle.signal();

    tokio::spawn(run_task(run_id, ctx, messages, signal, tx, final_tx));

    RunStream {
        run_id,
        rx,
        final_rx,
        abort_handle,
        saw_terminal: false,
    }
}

async fn run_task(
    run_id: uuid::Uuid,
    ctx: PlaygroundContext,
    messages: Vec<ChatMessage>,
    mut signal: AbortSignal,
    tx: mpsc::UnboundedSender<RunEvent>,
    final_tx: oneshot::Sender<SubmissionOutcome>,
) {
    debug!(run_id = %run_id, workflow_app_id = %ctx.workflow_app_id, "run started");
    let _ = tx.send(RunEvent::Started { run_id });

    let mut observer = ChannelObserver {
        run_id,
        seq: 0,
        tx: tx.clone(),
    };
    let outcome = execute(&ctx, messages, &mut signal, &mut observer).await;

    // Upstream errors were already sent live.
    for notification in &outcome.notifications {
        if !matches!(notification, Notification::UpstreamError { .. }) {
            let _ = tx.send(RunEvent::Notice {
                run_id,
                notification: notification.clone(),
            });
        }
    }
    debug!(run_id = %run_id, phase = ?outcome.phase, "run finished");
    let _ = tx.send(RunEvent::Finished {
        run_id,
        outcome: outcome.clone(),
    });
    let _ = final_tx.send(outcome);
}

struct ChannelObserver {
    run_id: uuid::Uuid,
    seq: u64,
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl StreamObserver for ChannelObserver {
    fn on_update(&mut self, buffer: &str) {
        let _ = self.tx.send(RunEvent::Updated {
            run_id: self.run_id,
            seq: self.seq,
            text: buffer.to_string(),
        });
        self.seq = self.seq.saturating_add(1);
    }

    fn on_upstream_error(&mut self, message: &str) {
        let _ = self.tx.send(RunEvent::Notice {
            run_id: self.run_id,
            notification: Notification::UpstreamError {
                message: message.to_string(),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::Phase;
    use crate::playground::tests::{Scripted, ScriptedGateway};
    use std::time::Duration;

    #[tokio::test]
    async fn abort_before_wait_is_observed() {
        let handle = AbortHandle::new();
        let mut signal = handle.signal();
        assert!(!signal.is_cancelled());
        handle.abort();
        handle.abort();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let mut signal = AbortSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_finish_returns_outcome() {
        let gateway = ScriptedGateway::new(vec![Scripted::Chunks(vec![
            Ok("data: {\"text\":\"a\"}\n"),
            Ok("data: {\"error\":{\"message\":\"warn\"}}\ndata: {\"text\":\"b\"}\n"),
            Ok("data: [DONE]\n"),
        ])]);
        let ctx = PlaygroundContext::new(gateway, "wf", "m");
        let mut run = start_run(ctx, vec![ChatMessage::user("go")]);
        let run_id = run.run_id();

        let mut events = Vec::new();
        while let Some(event) = run.next_event().await {
            let last = matches!(event, RunEvent::Finished { .. });
            events.push(event);
            if last {
                break;
            }
        }
        assert_eq!(events[0], RunEvent::Started { run_id });
        assert_eq!(
            events[1],
            RunEvent::Updated {
                run_id,
                seq: 0,
                text: "a".into()
            }
        );
        assert_eq!(
            events[2],
            RunEvent::Notice {
                run_id,
                notification: Notification::UpstreamError {
                    message: "warn".into()
                }
            }
        );
        assert_eq!(
            events[3],
            RunEvent::Updated {
                run_id,
                seq: 1,
                text: "ab".into()
            }
        );
        assert!(matches!(events[4], RunEvent::Finished { .. }));

        let outcome = run.finish().await.expect("outcome");
        assert_eq!(outcome.text, "ab");
        assert_eq!(outcome.phase, Phase::Done);
    }

    #[tokio::test]
    async fn abort_handle_cancels_a_hanging_stream() {
        let gateway = ScriptedGateway::new(vec![Scripted::Hang]);
        let ctx = PlaygroundContext::new(gateway, "wf", "m");
        let run = start_run(ctx, vec![ChatMessage::user("go")]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        run.abort_handle().abort();

        let outcome = tokio::time::timeout(Duration::from_secs(2), run.finish())
            .await
            .expect("finished in time")
            .expect("outcome");
        assert_eq!(outcome.phase, Phase::Aborted);
        assert_eq!(outcome.notifications, vec![Notification::Cancelled]);
    }
}
