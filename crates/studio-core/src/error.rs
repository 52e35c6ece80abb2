/// Errors raised by the domain model and configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A form or settings value failed validation.
    #[error("validation error: {0}")]
    Validation(String),
    /// Required configuration is missing or malformed.
    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
