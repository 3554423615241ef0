//! Typed parameters and decoded results for EBB operations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ebb_core::error::{Error, Result};

/// Microcontroller I/O port selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

impl Port {
    /// The port letter as sent on the wire.
    pub fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl TryFrom<char> for Port {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'A' => Ok(Port::A),
            'B' => Ok(Port::B),
            'C' => Ok(Port::C),
            'D' => Ok(Port::D),
            'E' => Ok(Port::E),
            _ => Err(Error::InvalidParameter(format!(
                "port {c:?} is not one of A, B, C, D, E"
            ))),
        }
    }
}

impl FromStr for Port {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Port::try_from(c),
            _ => Err(Error::InvalidParameter(format!(
                "port {s:?} is not one of A, B, C, D, E"
            ))),
        }
    }
}

/// Pen position. Encoded on the wire as `PEN_DOWN = 0`, `PEN_UP = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenState {
    Down,
    Up,
}

impl PenState {
    pub fn code(self) -> u8 {
        match self {
            PenState::Down => 0,
            PenState::Up => 1,
        }
    }
}

/// Direction of a single I/O pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Output,
    Input,
}

impl PinDirection {
    pub fn code(self) -> u8 {
        match self {
            PinDirection::Output => 0,
            PinDirection::Input => 1,
        }
    }
}

/// What the `T` command samples on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedReadMode {
    /// Digital port reads, reported as `I,…` lines.
    Digital,
    /// Analog channel reads, reported as `A,…` lines.
    Analog,
}

impl TimedReadMode {
    pub fn code(self) -> u8 {
        match self {
            TimedReadMode::Digital => 0,
            TimedReadMode::Analog => 1,
        }
    }
}

/// Board hardware revision, which fixes the V+ sense divider used by `QC`.
///
/// The revision cannot be read from the board; the caller supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareRevision {
    /// Original boards with a 1/11 divider.
    Original,
    /// Revised boards with a 1/9.2 divider.
    Revised,
}

impl HardwareRevision {
    /// Ratio of ADC pin voltage to supply voltage.
    pub fn divider_ratio(self) -> f64 {
        match self {
            HardwareRevision::Original => 1.0 / 11.0,
            HardwareRevision::Revised => 1.0 / 9.2,
        }
    }
}

/// Analog readings keyed by channel number, in ascending channel order.
///
/// Only enabled channels appear. Values are raw 10-bit ADC counts.
pub type AnalogReadings = BTreeMap<u8, u16>;

/// One byte per I/O port, A through E.
///
/// Used for TRIS configuration (`C`), port output (`O`) and port input (`I`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortValues {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
}

impl PortValues {
    pub fn as_array(&self) -> [u8; 5] {
        [self.a, self.b, self.c, self.d, self.e]
    }
}

/// Motor enable state from `QE`. `0` means disabled; otherwise the value is
/// the microstep divisor (1, 2, 4, 8 or 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorEnables {
    pub motor1: u8,
    pub motor2: u8,
}

impl MotorEnables {
    pub fn motor1_enabled(&self) -> bool {
        self.motor1 != 0
    }

    pub fn motor2_enabled(&self) -> bool {
        self.motor2 != 0
    }
}

/// Global step counters from `QS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPosition {
    pub motor1: i64,
    pub motor2: i64,
}

/// Motion status from `QM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorStatus {
    /// A motion command is executing.
    pub executing_motion: bool,
    /// Per-motor movement, motor 1 first.
    pub motor_moving: [bool; 2],
    /// The device-side motion FIFO is empty.
    pub fifo_empty: bool,
}

/// Bitfield status from `QG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralStatus {
    pub pin_rb5: bool,
    pub pin_rb2: bool,
    pub button_prg: bool,
    pub pen_down: bool,
    pub command_executing: bool,
    pub motor1_moving: bool,
    pub motor2_moving: bool,
    /// Inverse of bit 0, which reads 1 while the FIFO holds a command.
    pub fifo_empty: bool,
}

/// Motor current setting and supply voltage from `QC`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplyReading {
    /// Maximum motor current set by the on-board trimmer, in amps.
    pub motor_current: f64,
    /// Motor supply (V+) voltage, in volts.
    pub supply_voltage: f64,
}

/// Report from `ES` describing what the emergency stop interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EStopReport {
    /// A move was in progress and was interrupted.
    pub interrupted: bool,
    /// Steps of the queued (FIFO) move that were discarded, per motor.
    pub fifo_steps: [i64; 2],
    /// Steps remaining of the interrupted move, per motor.
    pub steps_remaining: [i64; 2],
}

/// Parameters of a low-level `LM` move.
///
/// Rates are unsigned 31-bit; steps and accelerations are signed 32-bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowLevelMove {
    pub rate1: u32,
    pub steps1: i32,
    pub accel1: i32,
    pub rate2: u32,
    pub steps2: i32,
    pub accel2: i32,
    /// Accumulator clear flags, 0-3.
    pub clear: Option<u8>,
}

/// Parameters of a time-limited `LT` move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimedLowLevelMove {
    /// Number of 40 us ISR intervals, 1 to 2^31-1.
    pub intervals: u32,
    pub rate1: i32,
    pub accel1: i32,
    pub rate2: i32,
    pub accel2: i32,
    /// Accumulator clear flags, 0-3.
    pub clear: Option<u8>,
}
