//! Async command/response client for the EiBotBoard (EBB).
//!
//! The EBB is a USB motion and pen controller that speaks a half-duplex
//! ASCII line protocol: one `\r`-terminated command, then zero or more reply
//! lines. This crate provides:
//!
//! - **Command builders and reply parsers** ([`commands`]) -- validate
//!   parameters, produce wire commands, and decode replies into typed values.
//! - **Typed values** ([`types`]) -- ports, pen state, status flags, readings.
//! - **Board driver** ([`board`]) -- one async method per device operation,
//!   queued through the single IO task from `ebb-io`.
//! - **Builder** ([`builder`]) -- fluent configuration for [`EbbBoard`].
//!
//! # Example
//!
//! ```
//! use ebb::commands::{cmd_enable_motors, parse_motor_status};
//!
//! assert_eq!(cmd_enable_motors(16, 16).wire(), "EM,16,16\r");
//!
//! let status = parse_motor_status(&["QM,1,1,1,1".to_string()]).unwrap();
//! assert!(status.executing_motion);
//! assert!(!status.fifo_empty);
//! ```

pub mod board;
pub mod builder;
pub mod commands;
pub mod types;
pub mod validate;

pub use board::EbbBoard;
pub use builder::EbbBuilder;
pub use ebb_core::error::{Error, Result};
pub use ebb_io::protocol::Command;
pub use types::{
    AnalogReadings, EStopReport, GeneralStatus, HardwareRevision, LowLevelMove, MotorEnables,
    MotorStatus, PenState, PinDirection, Port, PortValues, StepPosition, SupplyReading,
    TimedLowLevelMove, TimedReadMode,
};
