//! Mock line transport for deterministic testing of the command queue.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/reply pairs. Each written command is matched against the next
//! expectation; on a match the scripted reply lines are pushed into the line
//! stream, optionally after a delay. Writes are recorded in a [`SentLog`]
//! that stays readable after the transport has been boxed and handed to the
//! IO task.
//!
//! # Example
//!
//! ```
//! use ebb_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the queue writes `QE\r`, reply with two lines.
//! mock.expect("QE\r", &["4,16", "OK"]);
//! let log = mock.sent_log();
//! assert!(log.is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use ebb_core::error::{Error, Result};
use ebb_core::transport::{LineReceiver, Transport};

/// Capacity of the mock's line channel.
const LINE_CHANNEL_DEPTH: usize = 64;

/// A pre-loaded request/reply pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact text we expect to be written, terminator included.
    request: String,
    /// Lines to emit once the matching request has been written.
    reply: Vec<String>,
    /// Delay between the write and the first reply line.
    delay: Duration,
}

/// Shared record of every string written through a [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<String>>>);

impl SentLog {
    /// Snapshot of all writes so far, in order.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|v| v.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, text: &str) {
        if let Ok(mut v) = self.0.lock() {
            v.push(text.to_string());
        }
    }
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. A write that does not match the next
/// expectation (or arrives when none are left) fails with
/// [`Error::Transport`] and leaves the expectation queue untouched, so a
/// test that expects no I/O at all simply loads no expectations and checks
/// that the [`SentLog`] stays empty.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    line_tx: mpsc::Sender<String>,
    line_rx: Option<LineReceiver>,
    connected: bool,
    sent: SentLog,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_DEPTH);
        MockTransport {
            expectations: VecDeque::new(),
            line_tx,
            line_rx: Some(line_rx),
            connected: true,
            sent: SentLog::default(),
        }
    }

    /// Add an expected request with an immediate reply.
    ///
    /// `request` must match the written text exactly, including the
    /// trailing `\r`.
    pub fn expect(&mut self, request: &str, reply: &[&str]) {
        self.expect_delayed(request, reply, Duration::ZERO);
    }

    /// Add an expected request whose reply lines arrive after `delay`.
    pub fn expect_delayed(&mut self, request: &str, reply: &[&str], delay: Duration) {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            reply: reply.iter().map(|s| s.to_string()).collect(),
            delay,
        });
    }

    /// Add an expected request that the board never answers.
    pub fn expect_silent(&mut self, request: &str) {
        self.expect(request, &[]);
    }

    /// Handle to the log of written strings.
    pub fn sent_log(&self) -> SentLog {
        self.sent.clone()
    }

    /// Sender for injecting unsolicited lines into the line stream.
    pub fn line_sender(&self) -> mpsc::Sender<String> {
        self.line_tx.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `print()` calls return
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent.push(text);

        let matches = match self.expectations.front() {
            Some(expectation) => expectation.request == text,
            None => {
                return Err(Error::Transport(format!(
                    "no more expectations in mock transport, got {text:?}"
                )));
            }
        };
        if !matches {
            let expected = self
                .expectations
                .front()
                .map(|e| e.request.clone())
                .unwrap_or_default();
            return Err(Error::Transport(format!(
                "unexpected write: expected {expected:?}, got {text:?}"
            )));
        }

        let Some(expectation) = self.expectations.pop_front() else {
            return Ok(());
        };
        trace!(request = text, reply = ?expectation.reply, "mock reply scheduled");

        if expectation.delay.is_zero() {
            for line in expectation.reply {
                let _ = self.line_tx.try_send(line);
            }
        } else {
            let tx = self.line_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(expectation.delay).await;
                for line in expectation.reply {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }
        Ok(())
    }

    fn take_lines(&mut self) -> Option<LineReceiver> {
        self.line_rx.take()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
