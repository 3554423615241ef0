//! EbbBuilder -- fluent builder for constructing [`EbbBoard`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters and queue settings before the transport is
//! connected.
//!
//! # Example
//!
//! ```no_run
//! use ebb::EbbBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> ebb::Result<()> {
//! let board = EbbBuilder::new()
//!     .serial_port("/dev/ttyACM0")
//!     .command_timeout(Duration::from_millis(1000))
//!     .build()
//!     .await?;
//! println!("{}", board.version().await?);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use ebb_core::error::{Error, Result};
use ebb_core::transport::Transport;
use ebb_io::io::{IoConfig, spawn_io_task};
use ebb_io::protocol::DEFAULT_COMMAND_TIMEOUT;
use ebb_transport::{SerialConfig, SerialTransport};
use tracing::debug;

use crate::board::EbbBoard;

/// Default capacity of the command queue.
const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Fluent builder for [`EbbBoard`].
///
/// Defaults: 3000 ms command timeout, queue depth 32, 9600 baud 8N1.
pub struct EbbBuilder {
    serial_port: Option<String>,
    serial_config: SerialConfig,
    command_timeout: Duration,
    queue_depth: usize,
}

impl EbbBuilder {
    pub fn new() -> Self {
        EbbBuilder {
            serial_port: None,
            serial_config: SerialConfig::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyACM0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate. The EBB is a USB CDC device, so this
    /// rarely matters.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial_config.baud_rate = baud;
        self
    }

    /// Replace the full serial line configuration.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial_config = config;
        self
    }

    /// Set the response budget for commands that do not carry their own
    /// timeout (default: 3000 ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set how many commands may wait in the queue before callers block
    /// (default: 32).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Build an [`EbbBoard`] with a caller-provided transport.
    ///
    /// Connects the transport and starts the IO task. This is the entry
    /// point for tests (pass a `MockTransport` from `ebb-test-harness`).
    pub async fn build_with_transport(self, mut transport: Box<dyn Transport>) -> Result<EbbBoard> {
        if self.command_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "command_timeout must be non-zero".into(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(Error::InvalidParameter(
                "queue_depth must be at least 1".into(),
            ));
        }

        transport.connect().await?;
        let io = spawn_io_task(
            transport,
            IoConfig {
                command_timeout: self.command_timeout,
                queue_depth: self.queue_depth,
            },
        )?;
        debug!(
            timeout_ms = self.command_timeout.as_millis() as u64,
            queue_depth = self.queue_depth,
            "EBB board ready"
        );
        Ok(EbbBoard::new(io))
    }

    /// Build an [`EbbBoard`] using a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<EbbBoard> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let transport = SerialTransport::new(port, self.serial_config.clone());
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for EbbBuilder {
    fn default() -> Self {
        Self::new()
    }
}
