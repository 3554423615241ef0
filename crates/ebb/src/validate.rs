//! Parameter-range checks and reply field parsing shared by the encoders
//! and decoders in [`crate::commands`].

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use ebb_core::error::{Error, Result};

/// Largest magnitude accepted for step counts and move durations (2^24 - 1).
pub const MAX_24BIT: u32 = 16_777_215;

/// Largest value of a non-negative 31-bit field (2^31 - 1).
pub const MAX_31BIT: u32 = 2_147_483_647;

/// Maximum nickname length accepted by `ST`.
pub const MAX_NICKNAME_LEN: usize = 16;

/// Check that `value` lies within `range`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] naming the parameter and the range.
pub fn check_range<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + Display + Copy,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!(
            "{name} {value} out of range {}..={}",
            range.start(),
            range.end()
        )))
    }
}

/// Check a signed step count against +/-(2^24 - 1).
pub fn check_steps(name: &str, steps: i32) -> Result<i32> {
    let limit = MAX_24BIT as i32;
    check_range(name, steps, -limit..=limit)
}

/// Check a move duration against 1..=2^24 - 1 milliseconds.
pub fn check_duration_24(name: &str, duration: u32) -> Result<u32> {
    check_range(name, duration, 1..=MAX_24BIT)
}

/// Check a nickname for `ST`: at most 16 printable ASCII characters, no comma.
pub fn check_nickname(name: &str) -> Result<&str> {
    if name.len() > MAX_NICKNAME_LEN {
        return Err(Error::InvalidParameter(format!(
            "nickname {name:?} longer than {MAX_NICKNAME_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_graphic() || *c == ' ') || *c == ',')
    {
        return Err(Error::InvalidParameter(format!(
            "nickname {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(name)
}

/// Parse one numeric reply field, naming the whole reply on failure.
///
/// The board never sends an explicit `+`, so a leading plus sign is
/// rejected even where `FromStr` would accept it.
pub fn parse_field<T>(field: &str, reply: &str) -> Result<T>
where
    T: FromStr,
{
    let digits = field.trim();
    if digits.starts_with('+') {
        return Err(Error::Protocol(format!(
            "invalid field {field:?} in reply {reply:?}"
        )));
    }
    digits
        .parse::<T>()
        .map_err(|_| Error::Protocol(format!("invalid field {field:?} in reply {reply:?}")))
}

/// Parse a `0`/`1` reply field.
pub fn parse_flag(field: &str, reply: &str) -> Result<bool> {
    match field.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(Error::Protocol(format!(
            "expected 0 or 1, got {field:?} in reply {reply:?}"
        ))),
    }
}

/// Require exactly `count` fields.
pub fn expect_fields<'a>(fields: Vec<&'a str>, count: usize, reply: &str) -> Result<Vec<&'a str>> {
    if fields.len() == count {
        Ok(fields)
    } else {
        Err(Error::Protocol(format!(
            "expected {count} fields, got {} in reply {reply:?}",
            fields.len()
        )))
    }
}
