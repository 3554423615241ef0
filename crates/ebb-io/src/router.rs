//! FIFO response-handler queue.
//!
//! Every command that expects `n` reply lines registers `n` single-line
//! handlers in one step. Each incoming line is handed to the oldest
//! outstanding handler; when the last handler of a command is filled the
//! command's collected lines are released. A line that arrives while no
//! handler is outstanding is unsolicited and is returned to the caller for
//! logging instead of being attributed to anything.
//!
//! The router is plain owned state with no interior locking: the IO task is
//! its only user, so registration and delivery can never interleave.

use std::collections::VecDeque;

use tracing::trace;

/// Identifier assigned to each registered command.
pub type CommandId = u64;

/// One expected reply line of a command.
#[derive(Debug)]
struct LineHandler {
    command: CommandId,
    /// `true` for the final handler registered for `command`.
    last: bool,
}

/// Outcome of routing one incoming line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// No handler was outstanding; the line belongs to nobody.
    Unsolicited(String),
    /// The line filled a handler but its command still awaits more lines.
    Collected { command: CommandId, remaining: usize },
    /// The line filled the command's last handler.
    Complete {
        command: CommandId,
        lines: Vec<String>,
    },
}

/// Observable state of the router (and of the command queue driving it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// No command is awaiting reply lines.
    Idle,
    /// `remaining` reply lines are still outstanding.
    Awaiting { remaining: usize },
}

/// Ordered queue of pending line handlers plus the line buffers they fill.
#[derive(Debug, Default)]
pub struct ResponseRouter {
    handlers: VecDeque<LineHandler>,
    buffers: VecDeque<(CommandId, Vec<String>)>,
    next_id: CommandId,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` handlers for a new command and return its id.
    ///
    /// With `count == 0` nothing is registered; the id is still unique.
    pub fn register(&mut self, count: usize) -> CommandId {
        let command = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if count == 0 {
            return command;
        }
        self.handlers.extend((0..count).map(|i| LineHandler {
            command,
            last: i + 1 == count,
        }));
        self.buffers.push_back((command, Vec::with_capacity(count)));
        trace!(command, count, "registered response handlers");
        command
    }

    /// Deliver one incoming line to the oldest outstanding handler.
    pub fn route(&mut self, line: String) -> Routed {
        let Some(handler) = self.handlers.pop_front() else {
            return Routed::Unsolicited(line);
        };

        match self.buffers.front_mut() {
            Some((command, buf)) if *command == handler.command => buf.push(line),
            // Handlers and buffers are registered and removed together.
            _ => return Routed::Unsolicited(line),
        }

        if handler.last {
            let (command, lines) = self
                .buffers
                .pop_front()
                .unwrap_or((handler.command, Vec::new()));
            Routed::Complete { command, lines }
        } else {
            Routed::Collected {
                command: handler.command,
                remaining: self.remaining_for(handler.command),
            }
        }
    }

    /// Remove every handler of `command` and return the lines collected so
    /// far. Used on timeout and on early protocol failure.
    pub fn abandon(&mut self, command: CommandId) -> Vec<String> {
        self.handlers.retain(|h| h.command != command);
        match self.buffers.iter().position(|(id, _)| *id == command) {
            Some(pos) => self
                .buffers
                .remove(pos)
                .map(|(_, lines)| lines)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Current queue state.
    pub fn state(&self) -> RouterState {
        if self.handlers.is_empty() {
            RouterState::Idle
        } else {
            RouterState::Awaiting {
                remaining: self.handlers.len(),
            }
        }
    }

    fn remaining_for(&self, command: CommandId) -> usize {
        self.handlers.iter().filter(|h| h.command == command).count()
    }
}
