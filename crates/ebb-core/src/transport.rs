//! Transport trait for board communication.
//!
//! The [`Transport`] trait abstracts over the physical link to an EBB. The
//! board speaks a line protocol, so the abstraction is line-shaped rather
//! than byte-shaped: commands go out through [`Transport::print`], and each
//! fully delimited line of device output comes back through a single
//! consumer channel obtained once via [`Transport::take_lines`].
//!
//! Implementations exist for serial ports (`ebb-transport`) and for scripted
//! testing (`MockTransport` from the `ebb-test-harness` crate).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Receiving end of a transport's line stream.
///
/// Lines arrive in device order with their terminators stripped. The stream
/// has exactly one consumer, so lines are delivered one at a time.
pub type LineReceiver = mpsc::Receiver<String>;

/// Asynchronous line-level transport to a board.
///
/// Implementations handle byte I/O and line framing. Command structure and
/// reply matching are handled by the command queue that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying link. Calling `connect` on an open transport is a
    /// no-op.
    async fn connect(&mut self) -> Result<()>;

    /// Close the underlying link.
    ///
    /// After `disconnect()`, [`print`](Transport::print) returns
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn disconnect(&mut self) -> Result<()>;

    /// Write `text` to the board and resolve once it has been flushed.
    ///
    /// `text` is sent verbatim; the caller supplies the command terminator.
    async fn print(&mut self, text: &str) -> Result<()>;

    /// Take the receiving end of the line stream.
    ///
    /// Returns `None` if the receiver has already been taken.
    fn take_lines(&mut self) -> Option<LineReceiver>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
