/// Errors returned by a workflow gateway before or while streaming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Gateway answered with an error status.
    #[error("gateway returned status {status}: {message}")]
    Http { status: u16, message: String },
    /// Connection, timeout, or stream I/O failure.
    #[error("gateway transport error: {message}")]
    Transport { message: String },
    /// Response shape was unusable (HTML error page, undecodable JSON, ...).
    #[error("gateway protocol error: {message}")]
    Protocol { message: String },
}

impl GatewayError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Transport failures, throttling and server-side errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Protocol { .. } => false,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. }
            | Self::Transport { message }
            | Self::Protocol { message } => message,
        }
    }
}

/// Errors returned by the studio REST API client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// API answered with an error status; `detail` is the server's message.
    #[error("studio api error ({status}): {detail}")]
    Api { status: u16, detail: String },
    /// Connection or timeout failure.
    #[error("studio api transport error: {0}")]
    Transport(String),
    /// Response body did not match the expected shape.
    #[error("studio api decode error: {0}")]
    Decode(String),
    /// Request rejected locally before being sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// The API returned an empty result where a record was required.
    #[error("studio api returned no record: {0}")]
    Missing(String),
}

/// Detail the studio API sends, with status 401, for a record that does not exist.
pub const NOT_FOUND_DETAIL: &str = "我们找不到您正在寻找的内容 :/";

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status: 404, .. } | Self::Missing(_) => true,
            Self::Api { status, detail } => *status == 401 && detail == NOT_FOUND_DETAIL,
            _ => false,
        }
    }
}

impl From<studio_core::CoreError> for StoreError {
    fn from(value: studio_core::CoreError) -> Self {
        match value {
            studio_core::CoreError::Validation(msg) => Self::Validation(msg),
            studio_core::CoreError::Config(msg) => Self::Validation(msg),
        }
    }
}

/// Why a stream stopped before reaching a clean end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// The transport failed mid-stream.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The caller aborted the run.
    #[error("run cancelled")]
    Cancelled,
}

/// Top-level error type for the public harness API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid input to a builder or request.
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Gateway(GatewayError),
    #[error(transparent)]
    Store(StoreError),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl HarnessError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<GatewayError> for HarnessError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<StoreError> for HarnessError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<studio_core::CoreError> for HarnessError {
    fn from(value: studio_core::CoreError) -> Self {
        match value {
            studio_core::CoreError::Validation(msg) => Self::Validation(msg),
            studio_core::CoreError::Config(msg) => Self::Config(msg),
        }
    }
}
