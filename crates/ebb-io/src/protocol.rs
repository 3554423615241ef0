//! Shared framing and reply-shape checks for the EBB line protocol.
//!
//! Commands are comma-separated ASCII fields terminated by a carriage
//! return. Replies come back as whole lines (the transport strips the
//! `\r\n` / `\n\r` delimiters) and fall into a handful of shapes: a bare
//! `OK`, a data line followed by `OK`, or a single self-contained status
//! line.
//!
//! # Command format
//!
//! ```text
//! <name>[,<param>]*\r
//! ```

use std::time::Duration;

use ebb_core::error::{Error, Result};

/// The byte that terminates every command.
pub const TERMINATOR: char = '\r';

/// The acknowledgment line the board sends after a successful command.
pub const ACK: &str = "OK";

/// First character of the board's error reports (e.g. `!8 Err: Unknown command`).
pub const ERROR_PREFIX: char = '!';

/// Response budget applied when a command does not carry its own.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(3000);

/// How a command's reply is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The command produces no reply at all (e.g. `RB`).
    None,
    /// A single `OK` line.
    Ack,
    /// One data line followed by `OK`.
    DataAck,
    /// One self-contained line with no trailing `OK` (e.g. `QM,…`, `QG`).
    Line,
}

impl ResponseShape {
    /// Number of reply lines the command queue must collect.
    pub fn line_count(self) -> usize {
        match self {
            ResponseShape::None => 0,
            ResponseShape::Ack | ResponseShape::Line => 1,
            ResponseShape::DataAck => 2,
        }
    }
}

/// An encoded command ready for the queue.
///
/// Built by the per-operation encoders after parameter validation. The text
/// excludes the terminator; [`Command::wire`] appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    shape: ResponseShape,
    timeout: Option<Duration>,
}

impl Command {
    /// Create a command with an explicit reply shape.
    pub fn new(text: impl Into<String>, shape: ResponseShape) -> Self {
        Command {
            text: text.into(),
            shape,
            timeout: None,
        }
    }

    /// A command answered by a bare `OK`.
    pub fn ack(text: impl Into<String>) -> Self {
        Self::new(text, ResponseShape::Ack)
    }

    /// A command answered by a data line and then `OK`.
    pub fn data(text: impl Into<String>) -> Self {
        Self::new(text, ResponseShape::DataAck)
    }

    /// A command answered by one status line with no `OK`.
    pub fn line(text: impl Into<String>) -> Self {
        Self::new(text, ResponseShape::Line)
    }

    /// A command the board never answers.
    pub fn no_reply(text: impl Into<String>) -> Self {
        Self::new(text, ResponseShape::None)
    }

    /// Override the response budget for this command only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command text without the terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Number of reply lines this command yields.
    pub fn expected_lines(&self) -> usize {
        self.shape.line_count()
    }

    /// The per-command timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The exact string written to the transport.
    pub fn wire(&self) -> String {
        encode_line(&self.text)
    }
}

/// Append the command terminator to `text`.
///
/// # Example
///
/// ```
/// use ebb_io::protocol::encode_line;
///
/// assert_eq!(encode_line("EM,1,1"), "EM,1,1\r");
/// ```
pub fn encode_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(text);
    out.push(TERMINATOR);
    out
}

/// Returns `true` if `line` is one of the board's `!`-prefixed error reports.
pub fn is_error_line(line: &str) -> bool {
    line.trim_start().starts_with(ERROR_PREFIX)
}

/// Check that `line` is exactly the `OK` acknowledgment.
pub fn check_ack(line: &str) -> Result<()> {
    if line == ACK {
        Ok(())
    } else {
        Err(Error::Protocol(format!("expected {ACK:?}, got {line:?}")))
    }
}

/// Validate a bare-ack reply.
pub fn expect_ack(lines: &[String]) -> Result<()> {
    match lines {
        [line] => check_ack(line),
        _ => Err(Error::Protocol(format!(
            "expected a single {ACK:?} line, got {lines:?}"
        ))),
    }
}

/// Validate a data + ack reply and return the data line.
pub fn expect_data(lines: &[String]) -> Result<&str> {
    match lines {
        [data, ack] => {
            check_ack(ack)?;
            Ok(data.trim())
        }
        _ => Err(Error::Protocol(format!(
            "expected a data line followed by {ACK:?}, got {lines:?}"
        ))),
    }
}

/// Validate a single-line reply and return it.
pub fn expect_line(lines: &[String]) -> Result<&str> {
    match lines {
        [line] => Ok(line.trim()),
        _ => Err(Error::Protocol(format!(
            "expected a single status line, got {lines:?}"
        ))),
    }
}

/// Split a comma-separated status line and check its leading tag.
///
/// Returns the fields after the tag.
///
/// # Example
///
/// ```
/// use ebb_io::protocol::tagged_fields;
///
/// assert_eq!(tagged_fields("QM,1,0,0,0", "QM").unwrap(), vec!["1", "0", "0", "0"]);
/// assert!(tagged_fields("QX,1", "QM").is_err());
/// ```
pub fn tagged_fields<'a>(line: &'a str, tag: &str) -> Result<Vec<&'a str>> {
    let mut fields = line.split(',').map(str::trim);
    match fields.next() {
        Some(first) if first == tag => Ok(fields.collect()),
        _ => Err(Error::Protocol(format!(
            "expected {tag:?} reply, got {line:?}"
        ))),
    }
}
