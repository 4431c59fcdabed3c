use thiserror::Error;

/// Errors produced when parsing DSL input.
#[derive(Debug, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The parser's description of the failure, including its position.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
