//! Error taxonomy for command handling.

use thiserror::Error;

/// Errors that change a connection's control flow.
///
/// Ordinary protocol failures are answered with a numeric reply and are
/// not errors at this level; a handler returns one of these only when the
/// connection itself must react.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The client asked to leave; carries the quit reason.
    #[error("client quit: {0}")]
    Quit(String),
    /// Drop the connection without any reply (bad server password).
    #[error("connection dropped")]
    Drop,
    /// The outgoing queue is gone; the connection is dead.
    #[error("send error")]
    Send,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HandlerError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HandlerError::Send
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;
