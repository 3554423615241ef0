//! ebb-core: Core traits, types, and error definitions for the EBB client.
//!
//! This crate defines the pieces every other crate in the workspace shares:
//! the error taxonomy, the line-oriented [`Transport`] abstraction, and the
//! small numeric helpers used when decoding device replies.
//!
//! # Key types
//!
//! - [`Transport`] -- line-level communication channel to the board
//! - [`Error`] / [`Result`] -- error handling
//! - [`adc_to_volts`], [`bit_is_set`] -- reply decoding helpers

pub mod error;
pub mod helpers;
pub mod transport;

// Re-export key types at crate root for ergonomic `use ebb_core::*`.
pub use error::{Error, Result};
pub use helpers::{ADC_MAX, ADC_REFERENCE_VOLTS, adc_to_volts, bit_is_set};
pub use transport::{LineReceiver, Transport};
