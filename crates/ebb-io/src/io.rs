//! IO task types and implementation for the EBB command queue.
//!
//! This module implements the single-IO-task pattern. One tokio task owns
//! the transport and its line stream exclusively and processes queued
//! commands one at a time: write the command, register its reply handlers,
//! collect lines until the command is complete or its timeout fires, hand the
//! lines back to the caller, then move on to the next queued command.
//!
//! The queue advances on every completion path (reply collected, device
//! error line, write failure, timeout), so a single bad command cannot
//! wedge the commands queued behind it. After a timeout the queue first
//! waits for the line stream to go quiet, discarding anything that arrives,
//! so a late reply is never handed to the next command.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use ebb_core::error::{Error, Result};
use ebb_core::transport::{LineReceiver, Transport};

use crate::protocol::{self, Command, DEFAULT_COMMAND_TIMEOUT};
use crate::router::{ResponseRouter, Routed};

/// Quiet period the queue waits out after a timeout before dispatching the
/// next command. Each discarded late line restarts it.
pub const LATE_REPLY_WINDOW: Duration = Duration::from_millis(250);

/// Upper bound on the settle period, in multiples of [`LATE_REPLY_WINDOW`],
/// so a board that never goes quiet cannot stall the queue.
const LATE_REPLY_MAX_WINDOWS: u32 = 4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Response budget for commands that do not carry their own timeout.
    pub command_timeout: Duration,
    /// Capacity of the request channel. Callers wait for a free slot once
    /// this many commands are queued.
    pub queue_depth: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            queue_depth: 32,
        }
    }
}

/// One queued command awaiting dispatch.
pub struct PendingCommand {
    /// Command text without the terminator.
    pub text: String,
    /// Number of reply lines to collect.
    pub expected_lines: usize,
    /// Budget measured from write completion.
    pub timeout: Duration,
    pub reply: oneshot::Sender<Result<Vec<String>>>,
}

/// A request sent from board methods to the IO task.
pub enum Request {
    /// Write a command and collect its reply lines.
    Command(PendingCommand),
    /// Graceful shutdown; returns the transport for recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the IO task. Stored inside the board driver struct.
pub struct BoardIo {
    /// Command queue. Requests are served strictly in send order.
    pub tx: mpsc::Sender<Request>,
    /// Cancellation token for abrupt shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
    /// Budget applied to commands without their own timeout.
    pub command_timeout: Duration,
}

impl BoardIo {
    /// Queue a raw command and await its reply lines.
    ///
    /// `text` excludes the terminator. Resolves once `expected_lines` lines
    /// have been collected, or fails with [`Error::Timeout`] when `timeout`
    /// elapses after the write completed.
    pub async fn enqueue(
        &self,
        text: impl Into<String>,
        expected_lines: usize,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Command(PendingCommand {
                text: text.into(),
                expected_lines,
                timeout,
                reply: reply_tx,
            }))
            .await
            .map_err(|_| Error::NotConnected)?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Queue an encoded [`Command`] and await its reply lines.
    pub async fn send(&self, cmd: &Command) -> Result<Vec<String>> {
        let timeout = cmd.timeout().unwrap_or(self.command_timeout);
        self.enqueue(cmd.text(), cmd.expected_lines(), timeout).await
    }

    /// Shut down the IO task and recover the transport.
    ///
    /// Commands queued before the shutdown request are still served.
    pub async fn shutdown(mut self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(Request::Shutdown { reply: reply_tx }).await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = (&mut self.task).await;
        Ok(transport)
    }
}

impl Drop for BoardIo {
    fn drop(&mut self) {
        self.cancel.cancel();
        // A transport write that ignores cancellation would keep the task alive.
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for queueing commands.
///
/// Takes the transport's line stream; fails with [`Error::Transport`] if it
/// has already been taken by someone else.
pub fn spawn_io_task(mut transport: Box<dyn Transport>, config: IoConfig) -> Result<BoardIo> {
    let lines = transport
        .take_lines()
        .ok_or_else(|| Error::Transport("line stream already taken".into()))?;
    let (tx, rx) = mpsc::channel::<Request>(config.queue_depth.max(1));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(io_loop(transport, lines, rx, cancel.clone()));

    Ok(BoardIo {
        tx,
        cancel,
        task,
        command_timeout: config.command_timeout,
    })
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Lines that arrived while idle (unsolicited, dropped)
/// 3. The next queued request
async fn io_loop(
    mut transport: Box<dyn Transport>,
    mut lines: LineReceiver,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut router = ResponseRouter::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("EBB IO task cancelled");
                break;
            }

            line = lines.recv() => {
                match line {
                    Some(line) => match router.route(line) {
                        Routed::Unsolicited(line) => warn!(line, "unsolicited line, dropping"),
                        other => debug!(?other, "line routed while idle"),
                    },
                    None => {
                        debug!("line stream closed, exiting IO task");
                        break;
                    }
                }
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Command(cmd)) => {
                        let result = execute_command(
                            &mut *transport,
                            &mut lines,
                            &mut router,
                            &cmd.text,
                            cmd.expected_lines,
                            cmd.timeout,
                        )
                        .await;
                        let lost = matches!(result, Err(Error::ConnectionLost));
                        let timed_out = matches!(result, Err(Error::Timeout));
                        let _ = cmd.reply.send(result);
                        if lost {
                            debug!("connection lost, exiting IO task");
                            break;
                        }
                        if timed_out {
                            match settle_late_replies(&mut lines, &cancel).await {
                                Settle::Quiet => {}
                                Settle::Cancelled => {
                                    debug!("EBB IO task cancelled");
                                    break;
                                }
                                Settle::Closed => {
                                    debug!("line stream closed, exiting IO task");
                                    break;
                                }
                            }
                        }
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("request channel closed, exiting IO task");
                        break;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Write one command and collect its reply lines.
///
/// The timeout clock starts once the write has completed. A `!`-prefixed
/// device error line ends the command early with [`Error::Protocol`].
async fn execute_command(
    transport: &mut dyn Transport,
    lines: &mut LineReceiver,
    router: &mut ResponseRouter,
    text: &str,
    expected_lines: usize,
    timeout: Duration,
) -> Result<Vec<String>> {
    debug!(command = text, expected_lines, "dispatching command");
    transport.print(&protocol::encode_line(text)).await?;

    let command = router.register(expected_lines);
    if expected_lines == 0 {
        return Ok(Vec::new());
    }
    let deadline = Instant::now() + timeout;

    loop {
        tokio::select! {
            biased;

            line = lines.recv() => {
                let Some(line) = line else {
                    router.abandon(command);
                    return Err(Error::ConnectionLost);
                };

                if protocol::is_error_line(&line) {
                    router.abandon(command);
                    return Err(Error::Protocol(format!(
                        "board rejected {text:?}: {line:?}"
                    )));
                }

                match router.route(line) {
                    Routed::Complete { command: done, lines } if done == command => {
                        trace!(command = text, ?lines, "reply complete");
                        return Ok(lines);
                    }
                    Routed::Complete { command: other, lines } => {
                        debug!(other, ?lines, "reply completed for a stale command");
                    }
                    Routed::Collected { remaining, .. } => {
                        trace!(command = text, remaining, "reply line collected");
                    }
                    Routed::Unsolicited(line) => {
                        warn!(line, "unsolicited line, dropping");
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline) => {
                let partial = router.abandon(command);
                debug!(
                    command = text,
                    timeout_ms = timeout.as_millis() as u64,
                    ?partial,
                    "command timed out"
                );
                return Err(Error::Timeout);
            }
        }
    }
}

/// How the post-timeout settle period ended.
#[derive(Debug, PartialEq, Eq)]
enum Settle {
    Quiet,
    Cancelled,
    Closed,
}

/// Discard late reply lines after a timeout until the line stream has been
/// quiet for [`LATE_REPLY_WINDOW`], so a reply to the timed-out command is
/// never attributed to the next one.
async fn settle_late_replies(lines: &mut LineReceiver, cancel: &CancellationToken) -> Settle {
    let hard_stop = Instant::now() + LATE_REPLY_WINDOW * LATE_REPLY_MAX_WINDOWS;
    let mut quiet_until = Instant::now() + LATE_REPLY_WINDOW;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Settle::Cancelled,

            line = lines.recv() => match line {
                Some(line) => {
                    warn!(line, "discarding late reply line");
                    quiet_until = Instant::now() + LATE_REPLY_WINDOW;
                }
                None => return Settle::Closed,
            },

            _ = tokio::time::sleep_until(quiet_until.min(hard_stop)) => {
                trace!("line stream quiet after timeout");
                return Settle::Quiet;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
