//! ebb-test-harness: Test utilities and mock transports for the EBB client.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the command queue and the per-command encoders/decoders without a real
//! board attached.

pub mod mock_line;

pub use mock_line::{MockTransport, SentLog};
