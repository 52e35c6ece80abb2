//! Folds a `data:`-framed byte stream into one display buffer.

use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use tracing::debug;

use crate::decoder::LineDecoder;
use crate::errors::{GatewayError, RunFailure};
use crate::frame::{StreamFrame, classify_payload, data_payload};
use crate::run::AbortSignal;

/// Lifecycle of one accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    /// Nothing read yet.
    Idle,
    /// Bytes are arriving.
    Streaming,
    /// A complete frame replaced the buffer.
    Finalized,
    /// Done marker seen, or the transport closed cleanly.
    Done,
    /// Read error or cancellation.
    Aborted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Done | Self::Aborted)
    }
}

/// Text shown to the user so far.
///
/// `buffer` is the concatenation of every delta until a complete frame is
/// applied; from then on it is that frame's text and deltas no longer apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccumulatorState {
    pub buffer: String,
    pub finalized: bool,
}

impl AccumulatorState {
    /// Applies one frame and reports whether `buffer` changed.
    pub fn apply(&mut self, frame: &StreamFrame) -> bool {
        match frame {
            StreamFrame::Delta { text } => {
                if self.finalized || text.is_empty() {
                    return false;
                }
                self.buffer.push_str(text);
                true
            }
            StreamFrame::Complete { text } => {
                let changed = self.buffer != *text;
                self.buffer.clone_from(text);
                self.finalized = true;
                changed
            }
            StreamFrame::Error { .. } | StreamFrame::Done => false,
        }
    }
}

/// Receives buffer updates and upstream errors while a stream is consumed.
pub trait StreamObserver: Send {
    /// Called at most once per processed chunk, only when the buffer changed.
    fn on_update(&mut self, _buffer: &str) {}

    /// Called for every error frame, in arrival order.
    fn on_upstream_error(&mut self, _message: &str) {}
}

impl StreamObserver for () {}

/// What a single chunk did to the accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub changed: bool,
    pub upstream_errors: Vec<String>,
    pub frames: usize,
    pub malformed: usize,
}

/// Incremental stream-to-text accumulator.
///
/// Feed it raw chunks with [`push_chunk`](Self::push_chunk) and call
/// [`finish`](Self::finish) at transport EOF.
pub struct StreamAccumulator {
    decoder: LineDecoder,
    state: AccumulatorState,
    phase: Phase,
    ignored_after_terminal: u64,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            decoder: LineDecoder::default(),
            state: AccumulatorState::default(),
            phase: Phase::Idle,
            ignored_after_terminal: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn buffer(&self) -> &str {
        &self.state.buffer
    }

    /// Frames that arrived after a terminal phase and were dropped.
    pub fn ignored_after_terminal(&self) -> u64 {
        self.ignored_after_terminal
    }

    /// Bytes of an unterminated line waiting for more input.
    pub fn carried_bytes(&self) -> usize {
        self.decoder.pending_len()
    }

    pub fn into_state(self) -> AccumulatorState {
        self.state
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> ChunkReport {
        let mut report = ChunkReport::default();
        if chunk.is_empty() {
            return report;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Streaming;
        }
        let lines = self.decoder.push_chunk(chunk);
        self.process_lines(lines, &mut report);
        report
    }

    /// Flushes an unterminated last line and settles a clean close as `Done`.
    pub fn finish(&mut self) -> ChunkReport {
        let mut report = ChunkReport::default();
        if let Some(line) = self.decoder.finish() {
            self.process_lines(vec![line], &mut report);
        }
        if matches!(self.phase, Phase::Idle | Phase::Streaming) {
            self.phase = Phase::Done;
        }
        report
    }

    /// Moves to `Aborted` unless already terminal. The buffer is kept.
    pub fn abort(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = Phase::Aborted;
        }
    }

    fn process_lines(&mut self, lines: Vec<String>, report: &mut ChunkReport) {
        for line in lines {
            let Some(payload) = data_payload(&line) else {
                continue;
            };
            if self.phase.is_terminal() {
                self.ignored_after_terminal += 1;
                continue;
            }
            let frame = match classify_payload(payload) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(err) => {
                    debug!(
                        event = "stream.frame_malformed",
                        error = %err,
                        payload_len = payload.len(),
                        "skipping malformed stream frame"
                    );
                    report.malformed += 1;
                    continue;
                }
            };
            report.frames += 1;
            self.fold(frame, report);
        }
    }

    fn fold(&mut self, frame: StreamFrame, report: &mut ChunkReport) {
        if self.state.apply(&frame) {
            report.changed = true;
        }
        match frame {
            StreamFrame::Complete { .. } => self.phase = Phase::Finalized,
            StreamFrame::Done => self.phase = Phase::Done,
            StreamFrame::Error { message } => report.upstream_errors.push(message),
            StreamFrame::Delta { .. } => {}
        }
    }
}

/// Result of consuming one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Final (or partial, when aborted) text.
    pub text: String,
    pub phase: Phase,
    /// Set only when the phase is `Aborted`.
    pub failure: Option<RunFailure>,
    pub upstream_errors: Vec<String>,
}

/// Reads `stream` to its end, folding every chunk and notifying `observer`.
///
/// After a done marker or complete frame the transport is still drained until
/// it closes; late frames are ignored. Aborting through `abort` drops the
/// stream immediately, which closes the underlying connection.
pub async fn consume_stream<S>(
    stream: S,
    abort: &mut AbortSignal,
    observer: &mut dyn StreamObserver,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send,
{
    let mut stream = std::pin::pin!(stream);
    let mut acc = StreamAccumulator::new();
    let mut failure = None;
    let mut upstream_errors = Vec::new();
    let mut chunks = 0_u64;

    loop {
        tokio::select! {
            biased;
            _ = abort.cancelled() => {
                failure = stop(&mut acc, RunFailure::Cancelled);
                break;
            }
            next = stream.next() => {
                let report = match next {
                    Some(Ok(chunk)) => {
                        chunks += 1;
                        acc.push_chunk(&chunk)
                    }
                    Some(Err(err)) => {
                        debug!(
                            event = "stream.read_failed",
                            error = %err,
                            chunks,
                            carried = acc.carried_bytes(),
                            "stream read failed"
                        );
                        let message = err.message().to_string();
                        failure = stop(&mut acc, RunFailure::Transport { message });
                        break;
                    }
                    None => {
                        let report = acc.finish();
                        deliver(&report, acc.buffer(), observer, &mut upstream_errors);
                        break;
                    }
                };
                deliver(&report, acc.buffer(), observer, &mut upstream_errors);
            }
        }
    }

    debug!(
        event = "stream.finished",
        phase = ?acc.phase(),
        chunks,
        text_len = acc.buffer().len(),
        ignored = acc.ignored_after_terminal(),
        "stream consumed"
    );
    let phase = acc.phase();
    StreamOutcome {
        text: acc.into_state().buffer,
        phase,
        failure,
        upstream_errors,
    }
}

/// Aborts an unfinished stream and returns the failure to report. A stream
/// that already reached `Done` or `Finalized` keeps its phase and reports none.
fn stop(acc: &mut StreamAccumulator, failure: RunFailure) -> Option<RunFailure> {
    if acc.phase().is_terminal() {
        debug!(
            event = "stream.stopped_after_end",
            phase = ?acc.phase(),
            reason = %failure,
            "stream already complete"
        );
        return None;
    }
    acc.abort();
    Some(failure)
}

fn deliver(
    report: &ChunkReport,
    buffer: &str,
    observer: &mut dyn StreamObserver,
    upstream_errors: &mut Vec<String>,
) {
    for message in &report.upstream_errors {
        observer.on_upstream_error(message);
        upstream_errors.push(message.clone());
    }
    if report.changed {
        observer.on_update(buffer);
    }
}
