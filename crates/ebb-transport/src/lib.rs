//! Transport implementations for the EBB client.
//!
//! This crate provides a concrete implementation of the
//! [`Transport`](ebb_core::Transport) trait for the board's USB virtual COM
//! port, plus the byte-to-line framing it relies on:
//!
//! - [`SerialTransport`]: USB CDC / RS-232 serial connection
//! - [`LineFramer`]: splits the raw byte stream into `\r\n` / `\n\r`
//!   delimited lines
//!
//! # Example
//!
//! ```no_run
//! use ebb_transport::SerialTransport;
//! use ebb_core::transport::Transport;
//!
//! # async fn example() -> ebb_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 9600).await?;
//! let mut lines = transport.take_lines().expect("fresh transport");
//!
//! transport.print("V\r").await?;
//! let version = lines.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod framing;
pub mod serial;

pub use framing::LineFramer;
pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
