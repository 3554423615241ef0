//! Command queue and response router for the EBB line protocol.
//!
//! This crate provides the single-IO-task pattern for the EBB's
//! `\r`-terminated ASCII protocol. One tokio task owns the transport and its
//! line stream exclusively; it dispatches queued commands strictly one at a
//! time and attributes every incoming line to the oldest outstanding
//! response handler.
//!
//! # Architecture
//!
//! - [`protocol`] -- command framing, reply shapes, and shared line checks
//! - [`router`] -- FIFO response-handler queue
//! - [`io`] -- IO task types, spawn, and the select loop

pub mod io;
pub mod protocol;
pub mod router;

pub use io::{BoardIo, IoConfig, LATE_REPLY_WINDOW, PendingCommand, Request, spawn_io_task};
pub use protocol::{Command, DEFAULT_COMMAND_TIMEOUT, ResponseShape};
pub use router::{ResponseRouter, RouterState, Routed};
