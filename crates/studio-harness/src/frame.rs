//! Classification of `data:` payloads into stream frames.
//!
//! Precedence, first match wins:
//! 1. `[DONE]` sentinel
//! 2. an `error` field
//! 3. the completion override (`id == "langflow-complete"`, `complete == true`,
//!    non-empty `content`)
//! 4. a content delta from `choices[0].delta.content`, then `text`, then `response`
//!
//! Anything else is a control frame and yields no frame at all.

use serde_json::Value;

/// End-of-stream sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Reserved id the gateway uses for its final full-content message.
pub const COMPLETE_MARKER_ID: &str = "langflow-complete";

const DATA_PREFIX: &str = "data:";
const GENERIC_ERROR_MESSAGE: &str = "upstream reported an error";

/// One parsed unit from the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental content fragment.
    Delta { text: String },
    /// Authoritative final text superseding every earlier delta.
    Complete { text: String },
    /// Failure reported by the producer. Does not end the stream.
    Error { message: String },
    /// Explicit end-of-stream marker.
    Done,
}

/// A `data:` payload that is neither the sentinel nor valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("malformed frame payload: {source}")]
pub struct MalformedFrame {
    #[from]
    source: serde_json::Error,
}

/// Returns the trimmed payload of a `data:` line, `None` for any other line.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

/// Classifies one payload string.
pub fn classify_payload(payload: &str) -> Result<Option<StreamFrame>, MalformedFrame> {
    if payload == DONE_SENTINEL {
        return Ok(Some(StreamFrame::Done));
    }
    let value: Value = serde_json::from_str(payload)?;
    Ok(classify_value(&value))
}

/// Classifies an already-parsed JSON payload.
pub fn classify_value(value: &Value) -> Option<StreamFrame> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Some(StreamFrame::Error {
            message: error_message(error),
        });
    }
    if let Some(text) = completion_override(value) {
        return Some(StreamFrame::Complete {
            text: text.to_string(),
        });
    }
    delta_text(value).map(|text| StreamFrame::Delta {
        text: text.to_string(),
    })
}

fn error_message(error: &Value) -> String {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    };
    non_empty(error.get("detail"))
        .or_else(|| non_empty(error.get("message")))
        .or_else(|| non_empty(Some(error)))
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}

fn completion_override(value: &Value) -> Option<&str> {
    let is_marker = value.get("id").and_then(Value::as_str) == Some(COMPLETE_MARKER_ID);
    let is_complete = value.get("complete").and_then(Value::as_bool) == Some(true);
    if !(is_marker && is_complete) {
        return None;
    }
    value
        .get("content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn delta_text(value: &Value) -> Option<&str> {
    let openai = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"));
    [openai, value.get("text"), value.get("response")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
}
