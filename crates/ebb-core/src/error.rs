//! Error types for the EBB client.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Validation, protocol, timeout and
//! transport failures are all captured here.

/// The error type for all EBB operations.
///
/// Variants map onto four failure classes: parameter validation (raised
/// before any I/O), reply grammar mismatches, response timeouts, and
/// failures propagated from the transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open, write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A reply did not match the grammar expected for its command.
    ///
    /// The message always names the offending response text.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The expected number of reply lines did not arrive within the
    /// command's timeout budget.
    #[error("timeout waiting for response")]
    Timeout,

    /// A command parameter was outside its documented domain.
    ///
    /// Raised synchronously by the encoders; no bytes reach the transport.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the board has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the board was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
