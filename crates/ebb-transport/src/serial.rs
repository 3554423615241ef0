//! Serial port transport for board communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for the EBB's USB virtual COM port (and for physical
//! RS-232 adapters). The board enumerates as a CDC-ACM device, so the baud
//! rate is nominal; 9600 8N1 is the conventional setting.
//!
//! Writes go straight to the port. Reads run in a background task that
//! frames the byte stream into lines with [`LineFramer`] and forwards them,
//! one at a time and in arrival order, into the line channel returned by
//! [`Transport::take_lines`].
//!
//! # Example
//!
//! ```no_run
//! use ebb_transport::SerialTransport;
//! use ebb_core::transport::Transport;
//!
//! # async fn example() -> ebb_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyACM0", 9600).await?;
//! transport.print("QG\r").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use ebb_core::error::{Error, Result};
use ebb_core::transport::{LineReceiver, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;

use crate::framing::LineFramer;

/// Capacity of the line channel between the reader task and the consumer.
const LINE_CHANNEL_DEPTH: usize = 256;

/// Serial port configuration.
///
/// Defaults match the EBB's conventional settings:
/// - 9600 baud
/// - 8 data bits
/// - 1 stop bit
/// - No parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (nominal for USB CDC devices)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (typically None)
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Background reader state for an open port.
struct Reader {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Serial port transport for board communication.
///
/// Created closed by [`SerialTransport::new`] or already open by
/// [`SerialTransport::open`]. The line channel outlives individual
/// connections, so a consumer holding the receiver keeps working across a
/// `disconnect()` / `connect()` cycle.
pub struct SerialTransport {
    port_name: String,
    config: SerialConfig,
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<Reader>,
    line_tx: mpsc::Sender<String>,
    line_rx: Option<LineReceiver>,
}

impl SerialTransport {
    /// Create a transport for `port` without opening it.
    pub fn new(port: &str, config: SerialConfig) -> Self {
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_DEPTH);
        Self {
            port_name: port.to_string(),
            config,
            writer: None,
            reader: None,
            line_tx,
            line_rx: Some(line_rx),
        }
    }

    /// Open a serial port with the given baud rate and default settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyACM0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (9600 is conventional for the EBB)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        let mut transport = Self::new(port, config);
        transport.connect().await?;
        Ok(transport)
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.cancel.cancel();
            reader.task.abort();
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }

        let config = &self.config;
        tracing::debug!(
            port = %self.port_name,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let stream = tokio_serial::new(&self.port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %self.port_name, error = %e, "Failed to open serial port");
                Error::Transport(format!(
                    "Failed to open serial port {}: {}",
                    self.port_name, e
                ))
            })?;

        let (read_half, write_half) = tokio::io::split(stream);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(
            read_half,
            self.line_tx.clone(),
            cancel.clone(),
            self.port_name.clone(),
        ));

        self.writer = Some(write_half);
        self.reader = Some(Reader { cancel, task });

        tracing::info!(port = %self.port_name, baud_rate = config.baud_rate, "Serial port opened successfully");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stop_reader();
        if let Some(mut writer) = self.writer.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = writer.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(port = %self.port_name, text, "Sending command");

        let map_err = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::BrokenPipe
                || e.kind() == std::io::ErrorKind::NotConnected
            {
                Error::ConnectionLost
            } else {
                Error::Io(e)
            }
        };

        writer.write_all(text.as_bytes()).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_err(e)
        })?;

        // Flush so the completion really means the bytes left the host.
        writer.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_err(e)
        })?;

        Ok(())
    }

    fn take_lines(&mut self) -> Option<LineReceiver> {
        self.line_rx.take()
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.writer.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
        self.stop_reader();
    }
}

/// Read bytes from the port, frame them into lines, and forward the lines.
async fn read_loop(
    mut port: ReadHalf<SerialStream>,
    line_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    port_name: String,
) {
    let mut framer = LineFramer::default();
    let mut buf = [0u8; 256];

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => break,
            read = port.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::warn!(port = %port_name, "Serial port reached end of stream");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(port = %port_name, error = %e, "Failed to receive data");
                    break;
                }
            },
        };

        tracing::trace!(port = %port_name, bytes = n, data = ?&buf[..n], "Received data");
        framer.push(&buf[..n]);

        while let Some(line) = framer.next_line() {
            tracing::trace!(port = %port_name, line, "Received line");
            if line_tx.send(line).await.is_err() {
                tracing::debug!(port = %port_name, "Line receiver dropped, stopping reader");
                return;
            }
        }
    }
}
