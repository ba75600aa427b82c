//! Error types for the change-sync pipeline.

use thiserror::Error;

/// Errors that can occur while moving messages through the pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Queue transport error (receive or delete failed).
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Error parsing or decoding a message body.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl IngestError {
    /// Create a queue error.
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::QueueError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

/// Errors raised while turning a raw payload into a valid canonical event.
///
/// Both variants are terminal for the message: retrying cannot fix them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// The payload has no recognizable shape or could not be decoded.
    #[error("Could not transform event: {0}")]
    Transform(String),

    /// The event was normalized but breaks an invariant.
    #[error("Invalid event: {0}")]
    Invalid(String),
}

impl NormalizeError {
    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a validation error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
