//! EBB command encoders and reply decoders.
//!
//! Every `cmd_*` function validates its arguments and produces a
//! [`Command`] carrying the command text and the reply shape the board
//! answers with. Validation failures return [`Error::InvalidParameter`]
//! before anything reaches the queue.
//!
//! Every `parse_*` function takes the reply lines collected for one command
//! and decodes them. Any mismatch with the documented reply grammar returns
//! [`Error::Protocol`] naming the offending text.
//!
//! All functions are pure. [`EbbBoard`](crate::EbbBoard) pairs them with the
//! command queue.

use ebb_core::error::{Error, Result};
use ebb_core::helpers::{ADC_MAX, adc_to_volts, bit_is_set};
use ebb_io::protocol::{Command, expect_data, expect_line, tagged_fields};

use crate::types::{
    AnalogReadings, EStopReport, GeneralStatus, HardwareRevision, LowLevelMove, MotorEnables,
    MotorStatus, PenState, PinDirection, Port, PortValues, StepPosition, SupplyReading,
    TimedLowLevelMove, TimedReadMode,
};
use crate::validate::{
    MAX_31BIT, check_duration_24, check_nickname, check_range, check_steps, expect_fields,
    parse_field, parse_flag,
};

/// Highest analog channel number.
const MAX_ANALOG_CHANNEL: u8 = 15;
/// Highest EEPROM address for `MR`/`MW`.
const MAX_MEMORY_ADDRESS: u16 = 4095;
/// Highest pin number within a port.
const MAX_PORT_PIN: u8 = 7;
/// Highest RP pin usable by `S2`.
const MAX_SERVO_PIN: u8 = 24;
/// Highest layer number for `SL`.
const MAX_LAYER: u8 = 127;
/// Highest engraver PWM power for `SE`.
const MAX_ENGRAVER_POWER: u16 = 1023;
/// Longest `T` sampling period in milliseconds.
const MAX_TIMED_READ_MS: u16 = 32767;
/// `HM` step rate limits, in steps per second.
const HOME_RATE_MIN: u32 = 2;
const HOME_RATE_MAX: u32 = 25_000;
/// `PC` takes at most four length/period pairs.
const MAX_PULSE_CHANNELS: usize = 4;
/// Highest accumulator-clear value for `LM`/`LT`.
const MAX_CLEAR: u8 = 3;

/// Volts per amp of the motor current reference on `RA0`.
const CURRENT_SENSE_VOLTS_PER_AMP: f64 = 1.76;
/// Input diode drop added back to the V+ reading.
const SUPPLY_DIODE_DROP: f64 = 0.3;

fn flag(on: bool) -> u8 {
    u8::from(on)
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build an "analog value get" command (`A`).
pub fn cmd_analog_value_get() -> Command {
    Command::line("A")
}

/// Build an "analog configure" command (`AC,channel,enable`).
///
/// `channel` must be 0-15.
pub fn cmd_analog_configure(channel: u8, enabled: bool) -> Result<Command> {
    check_range("analog channel", channel, 0..=MAX_ANALOG_CHANNEL)?;
    Ok(Command::ack(format!("AC,{channel},{}", flag(enabled))))
}

/// Build a "configure pins" command (`C,a,b,c,d,e`) from TRIS bytes.
pub fn cmd_configure_pins(tris: PortValues) -> Command {
    let [a, b, c, d, e] = tris.as_array();
    Command::ack(format!("C,{a},{b},{c},{d},{e}"))
}

/// Build a "configure user options" command (`CU,option,value`).
pub fn cmd_configure_user_options(option: u8, value: u8) -> Result<Command> {
    check_range("user option", option, 1..=u8::MAX)?;
    Ok(Command::ack(format!("CU,{option},{value}")))
}

/// Build a "clear step position" command (`CS`).
pub fn cmd_clear_step_position() -> Command {
    Command::ack("CS")
}

/// Build an "enable motors" command (`EM,enable1,enable2`).
///
/// Each value is `0` to disable the motor or a microstep mode code. The
/// firmware owns the meaning of the codes, so any byte is passed through.
pub fn cmd_enable_motors(enable1: u8, enable2: u8) -> Command {
    Command::ack(format!("EM,{enable1},{enable2}"))
}

/// Build an "emergency stop" command (`ES` or `ES,1` to also disable motors).
pub fn cmd_emergency_stop(disable_motors: bool) -> Command {
    if disable_motors {
        Command::data("ES,1")
    } else {
        Command::data("ES")
    }
}

/// Build a "home move" command (`HM,rate[,pos1,pos2]`).
///
/// `rate` is in steps per second, 2-25000. With `position` the move targets
/// that absolute step position instead of home.
pub fn cmd_home_move(rate: u32, position: Option<(i32, i32)>) -> Result<Command> {
    check_range("home rate", rate, HOME_RATE_MIN..=HOME_RATE_MAX)?;
    let text = match position {
        Some((p1, p2)) => format!("HM,{rate},{p1},{p2}"),
        None => format!("HM,{rate}"),
    };
    Ok(Command::ack(text))
}

/// Build an "input" command (`I`).
pub fn cmd_input() -> Command {
    Command::line("I")
}

/// Build a "low-level move" command (`LM,r1,s1,a1,r2,s2,a2[,clear]`).
pub fn cmd_low_level_move(mv: &LowLevelMove) -> Result<Command> {
    check_range("rate1", mv.rate1, 0..=MAX_31BIT)?;
    check_range("rate2", mv.rate2, 0..=MAX_31BIT)?;
    let mut text = format!(
        "LM,{},{},{},{},{},{}",
        mv.rate1, mv.steps1, mv.accel1, mv.rate2, mv.steps2, mv.accel2
    );
    if let Some(clear) = mv.clear {
        check_range("clear", clear, 0..=MAX_CLEAR)?;
        text.push_str(&format!(",{clear}"));
    }
    Ok(Command::ack(text))
}

/// Build a "low-level move, time limited" command (`LT,n,r1,a1,r2,a2[,clear]`).
pub fn cmd_low_level_move_timed(mv: &TimedLowLevelMove) -> Result<Command> {
    check_range("intervals", mv.intervals, 1..=MAX_31BIT)?;
    let mut text = format!(
        "LT,{},{},{},{},{}",
        mv.intervals, mv.rate1, mv.accel1, mv.rate2, mv.accel2
    );
    if let Some(clear) = mv.clear {
        check_range("clear", clear, 0..=MAX_CLEAR)?;
        text.push_str(&format!(",{clear}"));
    }
    Ok(Command::ack(text))
}

/// Build a "memory read" command (`MR,address`). `address` must be 0-4095.
pub fn cmd_memory_read(address: u16) -> Result<Command> {
    check_range("address", address, 0..=MAX_MEMORY_ADDRESS)?;
    Ok(Command::line(format!("MR,{address}")))
}

/// Build a "memory write" command (`MW,address,value`).
pub fn cmd_memory_write(address: u16, value: u8) -> Result<Command> {
    check_range("address", address, 0..=MAX_MEMORY_ADDRESS)?;
    Ok(Command::ack(format!("MW,{address},{value}")))
}

/// Build a "node count decrement" command (`ND`).
pub fn cmd_node_count_decrement() -> Command {
    Command::ack("ND")
}

/// Build a "node count increment" command (`NI`).
pub fn cmd_node_count_increment() -> Command {
    Command::ack("NI")
}

/// Build an "output" command (`O,a,b,c,d,e`).
pub fn cmd_output(values: PortValues) -> Command {
    let [a, b, c, d, e] = values.as_array();
    Command::ack(format!("O,{a},{b},{c},{d},{e}"))
}

/// Build a "pulse configure" command (`PC,len0,period0[,len1,period1...]`).
///
/// Takes one to four `(length, period)` pairs for RB0 upward.
pub fn cmd_pulse_configure(channels: &[(u16, u16)]) -> Result<Command> {
    if channels.is_empty() || channels.len() > MAX_PULSE_CHANNELS {
        return Err(Error::InvalidParameter(format!(
            "pulse configure takes 1..={MAX_PULSE_CHANNELS} channels, got {}",
            channels.len()
        )));
    }
    let mut text = String::from("PC");
    for (length, period) in channels {
        text.push_str(&format!(",{length},{period}"));
    }
    Ok(Command::ack(text))
}

/// Build a "pulse go" command (`PG,0|1`).
pub fn cmd_pulse_go(on: bool) -> Command {
    Command::ack(format!("PG,{}", flag(on)))
}

/// Build a "pin direction" command (`PD,port,pin,direction`).
pub fn cmd_pin_direction(port: Port, pin: u8, direction: PinDirection) -> Result<Command> {
    check_range("pin", pin, 0..=MAX_PORT_PIN)?;
    Ok(Command::ack(format!("PD,{port},{pin},{}", direction.code())))
}

/// Build a "pin input" command (`PI,port,pin`).
pub fn cmd_pin_input(port: Port, pin: u8) -> Result<Command> {
    check_range("pin", pin, 0..=MAX_PORT_PIN)?;
    Ok(Command::line(format!("PI,{port},{pin}")))
}

/// Build a "pin output" command (`PO,port,pin,value`).
pub fn cmd_pin_output(port: Port, pin: u8, high: bool) -> Result<Command> {
    check_range("pin", pin, 0..=MAX_PORT_PIN)?;
    Ok(Command::ack(format!("PO,{port},{pin},{}", flag(high))))
}

/// Build a "query button" command (`QB`).
pub fn cmd_query_button() -> Command {
    Command::data("QB")
}

/// Build a "query current" command (`QC`).
pub fn cmd_query_current() -> Command {
    Command::data("QC")
}

/// Build a "query motor enables" command (`QE`).
pub fn cmd_query_motor_enables() -> Command {
    Command::data("QE")
}

/// Build a "query general" command (`QG`).
pub fn cmd_query_general() -> Command {
    Command::line("QG")
}

/// Build a "query layer" command (`QL`).
pub fn cmd_query_layer() -> Command {
    Command::data("QL")
}

/// Build a "query motors" command (`QM`).
pub fn cmd_query_motors() -> Command {
    Command::line("QM")
}

/// Build a "query node count" command (`QN`).
pub fn cmd_query_node_count() -> Command {
    Command::data("QN")
}

/// Build a "query pen" command (`QP`).
pub fn cmd_query_pen() -> Command {
    Command::data("QP")
}

/// Build a "query servo power" command (`QR`).
pub fn cmd_query_servo_power() -> Command {
    Command::data("QR")
}

/// Build a "query step position" command (`QS`).
pub fn cmd_query_step_position() -> Command {
    Command::data("QS")
}

/// Build a "query nickname" command (`QT`).
pub fn cmd_query_nickname() -> Command {
    Command::data("QT")
}

/// Build a "reset" command (`R`).
pub fn cmd_reset() -> Command {
    Command::ack("R")
}

/// Build a "reboot" command (`RB`). The board resets without replying.
pub fn cmd_reboot() -> Command {
    Command::no_reply("RB")
}

/// Build a "servo output" command (`S2,position,pin[,rate[,delay]]`).
///
/// `pin` is an RP pin number, 0-24. `delay` is only sent after `rate`.
pub fn cmd_servo_output(
    position: u16,
    pin: u8,
    rate: Option<u16>,
    delay: Option<u16>,
) -> Result<Command> {
    check_range("servo pin", pin, 0..=MAX_SERVO_PIN)?;
    let mut text = format!("S2,{position},{pin}");
    match (rate, delay) {
        (None, Some(_)) => {
            return Err(Error::InvalidParameter(
                "servo delay requires a rate".into(),
            ));
        }
        (Some(rate), None) => text.push_str(&format!(",{rate}")),
        (Some(rate), Some(delay)) => text.push_str(&format!(",{rate},{delay}")),
        (None, None) => {}
    }
    Ok(Command::ack(text))
}

/// Build a "stepper and servo mode configure" command (`SC,param,value`).
pub fn cmd_stepper_servo_configure(param: u8, value: u16) -> Result<Command> {
    check_range("configure parameter", param, 1..=u8::MAX)?;
    Ok(Command::ack(format!("SC,{param},{value}")))
}

/// Build a "set engraver" command (`SE,state[,power[,use_motion_queue]]`).
///
/// `power` is 0-1023. `use_motion_queue` is only sent after `power`.
pub fn cmd_set_engraver(
    on: bool,
    power: Option<u16>,
    use_motion_queue: Option<bool>,
) -> Result<Command> {
    let mut text = format!("SE,{}", flag(on));
    match (power, use_motion_queue) {
        (None, Some(_)) => {
            return Err(Error::InvalidParameter(
                "engraver motion-queue flag requires a power".into(),
            ));
        }
        (Some(power), queue) => {
            check_range("engraver power", power, 0..=MAX_ENGRAVER_POWER)?;
            text.push_str(&format!(",{power}"));
            if let Some(queue) = queue {
                text.push_str(&format!(",{}", flag(queue)));
            }
        }
        (None, None) => {}
    }
    Ok(Command::ack(text))
}

/// Build a "set layer" command (`SL,layer`). `layer` must be 0-127.
pub fn cmd_set_layer(layer: u8) -> Result<Command> {
    check_range("layer", layer, 0..=MAX_LAYER)?;
    Ok(Command::ack(format!("SL,{layer}")))
}

/// Build a "stepper move" command (`SM,duration,steps1[,steps2]`).
///
/// `duration` is in milliseconds, 1 to 2^24-1. Step counts are limited to
/// +/-(2^24-1).
pub fn cmd_stepper_move(duration: u32, steps1: i32, steps2: Option<i32>) -> Result<Command> {
    check_duration_24("duration", duration)?;
    check_steps("steps1", steps1)?;
    let text = match steps2 {
        Some(steps2) => {
            check_steps("steps2", steps2)?;
            format!("SM,{duration},{steps1},{steps2}")
        }
        None => format!("SM,{duration},{steps1}"),
    };
    Ok(Command::ack(text))
}

/// Build a "set node count" command (`SN,count`).
pub fn cmd_set_node_count(count: u32) -> Command {
    Command::ack(format!("SN,{count}"))
}

/// Build a "set pen state" command (`SP,state[,duration[,pin]]`).
///
/// `pin` selects the servo output pin on port B (0-7) and requires
/// `duration`.
pub fn cmd_set_pen_state(
    state: PenState,
    duration: Option<u16>,
    pin: Option<u8>,
) -> Result<Command> {
    let mut text = format!("SP,{}", state.code());
    match (duration, pin) {
        (None, Some(_)) => {
            return Err(Error::InvalidParameter(
                "pen pin requires a duration".into(),
            ));
        }
        (Some(duration), pin) => {
            text.push_str(&format!(",{duration}"));
            if let Some(pin) = pin {
                check_range("pen pin", pin, 0..=MAX_PORT_PIN)?;
                text.push_str(&format!(",{pin}"));
            }
        }
        (None, None) => {}
    }
    Ok(Command::ack(text))
}

/// Build a "set servo power timeout" command (`SR,ms[,state]`).
pub fn cmd_set_servo_power_timeout(timeout_ms: u32, power_on: Option<bool>) -> Command {
    match power_on {
        Some(on) => Command::ack(format!("SR,{timeout_ms},{}", flag(on))),
        None => Command::ack(format!("SR,{timeout_ms}")),
    }
}

/// Build a "set nickname" command (`ST,name`).
///
/// The name is at most 16 printable ASCII characters and may not contain a
/// comma. An empty name clears the nickname.
pub fn cmd_set_nickname(name: &str) -> Result<Command> {
    let name = check_nickname(name)?;
    Ok(Command::ack(format!("ST,{name}")))
}

/// Build a "timed read" command (`T,duration,mode`).
///
/// `duration` is the sampling period in milliseconds, 1-32767.
pub fn cmd_timed_read(duration: u16, mode: TimedReadMode) -> Result<Command> {
    check_range("timed read duration", duration, 1..=MAX_TIMED_READ_MS)?;
    Ok(Command::ack(format!("T,{duration},{}", mode.code())))
}

/// Build a "toggle pen" command (`TP[,duration]`).
pub fn cmd_toggle_pen(duration: Option<u16>) -> Command {
    match duration {
        Some(duration) => Command::ack(format!("TP,{duration}")),
        None => Command::ack("TP"),
    }
}

/// Build a "version" command (`V`).
pub fn cmd_version() -> Command {
    Command::line("V")
}

/// Build a "stepper move, mixed axis" command (`XM,duration,a_steps,b_steps`).
///
/// Same limits as [`cmd_stepper_move`].
pub fn cmd_stepper_move_mixed_axis(duration: u32, a_steps: i32, b_steps: i32) -> Result<Command> {
    check_duration_24("duration", duration)?;
    check_steps("a_steps", a_steps)?;
    check_steps("b_steps", b_steps)?;
    Ok(Command::ack(format!("XM,{duration},{a_steps},{b_steps}")))
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Parse an `A,cc:vvvv,...` analog report.
///
/// Only enabled channels appear. Channels are keyed in ascending order
/// regardless of the order on the wire.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the tag is wrong, a token is not
/// `channel:value`, or a value exceeds the 10-bit ADC range.
pub fn parse_analog(lines: &[String]) -> Result<AnalogReadings> {
    let line = expect_line(lines)?;
    let mut readings = AnalogReadings::new();
    for token in tagged_fields(line, "A")? {
        if token.is_empty() {
            continue;
        }
        let (channel, value) = token.split_once(':').ok_or_else(|| {
            Error::Protocol(format!("analog token {token:?} missing ':' in {line:?}"))
        })?;
        let channel: u8 = parse_field(channel, line)?;
        let value: u16 = parse_field(value, line)?;
        if channel > MAX_ANALOG_CHANNEL || value > ADC_MAX {
            return Err(Error::Protocol(format!(
                "analog token {token:?} out of range in {line:?}"
            )));
        }
        if readings.insert(channel, value).is_some() {
            return Err(Error::Protocol(format!(
                "analog channel {channel} reported twice in {line:?}"
            )));
        }
    }
    Ok(readings)
}

/// Parse an `I,a,b,c,d,e` port input report.
pub fn parse_input(lines: &[String]) -> Result<PortValues> {
    let line = expect_line(lines)?;
    let fields = expect_fields(tagged_fields(line, "I")?, 5, line)?;
    Ok(PortValues {
        a: parse_field(fields[0], line)?,
        b: parse_field(fields[1], line)?,
        c: parse_field(fields[2], line)?,
        d: parse_field(fields[3], line)?,
        e: parse_field(fields[4], line)?,
    })
}

/// Parse a `PI,v` pin input report. Returns `true` for a high pin.
pub fn parse_pin_input(lines: &[String]) -> Result<bool> {
    let line = expect_line(lines)?;
    let fields = expect_fields(tagged_fields(line, "PI")?, 1, line)?;
    parse_flag(fields[0], line)
}

/// Parse an `MR,v` memory read report.
pub fn parse_memory_read(lines: &[String]) -> Result<u8> {
    let line = expect_line(lines)?;
    let fields = expect_fields(tagged_fields(line, "MR")?, 1, line)?;
    parse_field(fields[0], line)
}

/// Parse the `ES` report: `interrupted,fifo1,fifo2,remaining1,remaining2` then `OK`.
pub fn parse_emergency_stop(lines: &[String]) -> Result<EStopReport> {
    let data = expect_data(lines)?;
    let fields = expect_fields(data.split(',').collect(), 5, data)?;
    Ok(EStopReport {
        interrupted: parse_flag(fields[0], data)?,
        fifo_steps: [parse_field(fields[1], data)?, parse_field(fields[2], data)?],
        steps_remaining: [parse_field(fields[3], data)?, parse_field(fields[4], data)?],
    })
}

/// Parse a single `0`/`1` data line followed by `OK` (`QB`, `QR`).
pub fn parse_data_flag(lines: &[String]) -> Result<bool> {
    let data = expect_data(lines)?;
    parse_flag(data, data)
}

/// Parse a single integer data line followed by `OK` (`QL`, `QN`).
pub fn parse_data_integer<T>(lines: &[String]) -> Result<T>
where
    T: std::str::FromStr,
{
    let data = expect_data(lines)?;
    parse_field(data, data)
}

/// Parse the `QC` report and convert it to physical units.
///
/// The reply carries two raw 10-bit readings: the motor current reference
/// on RA0 and the divided-down V+ supply. `revision` selects the supply
/// divider ratio, which differs between board revisions.
pub fn parse_current(lines: &[String], revision: HardwareRevision) -> Result<SupplyReading> {
    let data = expect_data(lines)?;
    let fields = expect_fields(data.split(',').collect(), 2, data)?;
    let current_raw: u16 = parse_field(fields[0], data)?;
    let supply_raw: u16 = parse_field(fields[1], data)?;
    if current_raw > ADC_MAX || supply_raw > ADC_MAX {
        return Err(Error::Protocol(format!(
            "current reading out of ADC range: {data:?}"
        )));
    }
    Ok(SupplyReading {
        motor_current: adc_to_volts(current_raw) / CURRENT_SENSE_VOLTS_PER_AMP,
        supply_voltage: adc_to_volts(supply_raw) / revision.divider_ratio() + SUPPLY_DIODE_DROP,
    })
}

/// Parse the `QE` report: `enable1,enable2` then `OK`.
pub fn parse_motor_enables(lines: &[String]) -> Result<MotorEnables> {
    let data = expect_data(lines)?;
    let fields = expect_fields(data.split(',').collect(), 2, data)?;
    Ok(MotorEnables {
        motor1: parse_field(fields[0], data)?,
        motor2: parse_field(fields[1], data)?,
    })
}

/// Parse the `QG` two-digit hex status byte.
///
/// | Bit | Flag |
/// |-----|------|
/// | 7 | RB5 pin |
/// | 6 | RB2 pin |
/// | 5 | PRG button pressed |
/// | 4 | pen down |
/// | 3 | command executing |
/// | 2 | motor 1 moving |
/// | 1 | motor 2 moving |
/// | 0 | FIFO not empty |
pub fn parse_general_status(lines: &[String]) -> Result<GeneralStatus> {
    let line = expect_line(lines)?;
    if line.len() != 2 || !line.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Protocol(format!(
            "expected 2 hex digits, got {line:?}"
        )));
    }
    let byte = u8::from_str_radix(line, 16)
        .map_err(|_| Error::Protocol(format!("invalid hex status byte {line:?}")))?;
    Ok(GeneralStatus {
        pin_rb5: bit_is_set(byte, 7),
        pin_rb2: bit_is_set(byte, 6),
        button_prg: bit_is_set(byte, 5),
        pen_down: bit_is_set(byte, 4),
        command_executing: bit_is_set(byte, 3),
        motor1_moving: bit_is_set(byte, 2),
        motor2_moving: bit_is_set(byte, 1),
        fifo_empty: !bit_is_set(byte, 0),
    })
}

/// Parse a `QM,command,motor1,motor2,fifo` motion status report.
pub fn parse_motor_status(lines: &[String]) -> Result<MotorStatus> {
    let line = expect_line(lines)?;
    let fields = expect_fields(tagged_fields(line, "QM")?, 4, line)?;
    Ok(MotorStatus {
        executing_motion: parse_flag(fields[0], line)?,
        motor_moving: [parse_flag(fields[1], line)?, parse_flag(fields[2], line)?],
        fifo_empty: !parse_flag(fields[3], line)?,
    })
}

/// Parse the `QP` report. `0` is pen down, `1` is pen up.
pub fn parse_pen_state(lines: &[String]) -> Result<PenState> {
    let data = expect_data(lines)?;
    match data {
        "0" => Ok(PenState::Down),
        "1" => Ok(PenState::Up),
        _ => Err(Error::Protocol(format!("unexpected pen state: {data:?}"))),
    }
}

/// Parse the `QS` report: `steps1,steps2` then `OK`.
pub fn parse_step_position(lines: &[String]) -> Result<StepPosition> {
    let data = expect_data(lines)?;
    let fields = expect_fields(data.split(',').collect(), 2, data)?;
    Ok(StepPosition {
        motor1: parse_field(fields[0], data)?,
        motor2: parse_field(fields[1], data)?,
    })
}

/// Parse the `QT` report. An unset nickname comes back as an empty line.
pub fn parse_nickname(lines: &[String]) -> Result<String> {
    expect_data(lines).map(str::to_string)
}

/// Parse the `V` firmware version banner.
pub fn parse_version(lines: &[String]) -> Result<String> {
    let line = expect_line(lines)?;
    if line.is_empty() {
        return Err(Error::Protocol("empty version reply".into()));
    }
    Ok(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_io::protocol::ResponseShape;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn assert_invalid(result: Result<Command>) {
        assert!(
            matches!(result, Err(Error::InvalidParameter(_))),
            "expected InvalidParameter, got {result:?}"
        );
    }

    // ---------------------------------------------------------------
    // Command building verification
    // ---------------------------------------------------------------

    #[test]
    fn enable_motors_wire() {
        let cmd = cmd_enable_motors(16, 16);
        assert_eq!(cmd.wire(), "EM,16,16\r");
        assert_eq!(cmd.shape(), ResponseShape::Ack);
    }

    #[test]
    fn mixed_axis_wire() {
        let cmd = cmd_stepper_move_mixed_axis(1337, 100, 200).unwrap();
        assert_eq!(cmd.wire(), "XM,1337,100,200\r");
    }

    #[test]
    fn mixed_axis_limits() {
        assert_invalid(cmd_stepper_move_mixed_axis(0, 1, 1));
        assert_invalid(cmd_stepper_move_mixed_axis(16_777_216, 1, 1));
        assert_invalid(cmd_stepper_move_mixed_axis(10, 16_777_216, 1));
        assert_invalid(cmd_stepper_move_mixed_axis(10, 1, -16_777_216));
        assert!(cmd_stepper_move_mixed_axis(16_777_215, -16_777_215, 16_777_215).is_ok());
    }

    #[test]
    fn stepper_move_optional_second_axis() {
        assert_eq!(cmd_stepper_move(500, -20, None).unwrap().text(), "SM,500,-20");
        assert_eq!(
            cmd_stepper_move(500, -20, Some(40)).unwrap().text(),
            "SM,500,-20,40"
        );
        assert_invalid(cmd_stepper_move(500, 1, Some(20_000_000)));
    }

    #[test]
    fn analog_configure() {
        assert_eq!(cmd_analog_configure(5, true).unwrap().wire(), "AC,5,1\r");
        assert_eq!(cmd_analog_configure(0, false).unwrap().wire(), "AC,0,0\r");
        assert_invalid(cmd_analog_configure(16, true));
    }

    #[test]
    fn port_commands() {
        let values = PortValues {
            a: 0,
            b: 255,
            c: 3,
            d: 16,
            e: 7,
        };
        assert_eq!(cmd_configure_pins(values).text(), "C,0,255,3,16,7");
        assert_eq!(cmd_output(values).text(), "O,0,255,3,16,7");
        assert_eq!(cmd_input().shape(), ResponseShape::Line);
    }

    #[test]
    fn pin_commands() {
        assert_eq!(
            cmd_pin_direction(Port::B, 3, PinDirection::Input)
                .unwrap()
                .text(),
            "PD,B,3,1"
        );
        assert_eq!(cmd_pin_output(Port::C, 7, true).unwrap().text(), "PO,C,7,1");
        let pi = cmd_pin_input(Port::A, 0).unwrap();
        assert_eq!(pi.text(), "PI,A,0");
        assert_eq!(pi.shape(), ResponseShape::Line);
        assert_invalid(cmd_pin_output(Port::C, 8, true));
        assert_invalid(cmd_pin_input(Port::E, 9));
    }

    #[test]
    fn memory_commands() {
        assert_eq!(cmd_memory_read(4095).unwrap().text(), "MR,4095");
        assert_eq!(cmd_memory_write(12, 200).unwrap().text(), "MW,12,200");
        assert_invalid(cmd_memory_read(4096));
        assert_invalid(cmd_memory_write(5000, 1));
    }

    #[test]
    fn home_move() {
        assert_eq!(cmd_home_move(3200, None).unwrap().text(), "HM,3200");
        assert_eq!(
            cmd_home_move(3200, Some((-100, 250))).unwrap().text(),
            "HM,3200,-100,250"
        );
        assert_invalid(cmd_home_move(1, None));
        assert_invalid(cmd_home_move(25_001, None));
    }

    #[test]
    fn low_level_move() {
        let mv = LowLevelMove {
            rate1: 85_899_345,
            steps1: 1000,
            accel1: 0,
            rate2: 0,
            steps2: 0,
            accel2: -12,
            clear: None,
        };
        assert_eq!(
            cmd_low_level_move(&mv).unwrap().text(),
            "LM,85899345,1000,0,0,0,-12"
        );
        let cleared = LowLevelMove {
            clear: Some(3),
            ..mv
        };
        assert!(cmd_low_level_move(&cleared).unwrap().text().ends_with(",3"));
        assert_invalid(cmd_low_level_move(&LowLevelMove {
            clear: Some(4),
            ..mv
        }));
        assert_invalid(cmd_low_level_move(&LowLevelMove {
            rate2: MAX_31BIT + 1,
            ..mv
        }));
    }

    #[test]
    fn low_level_move_timed() {
        let mv = TimedLowLevelMove {
            intervals: 25_000,
            rate1: 17_179_869,
            accel1: 0,
            rate2: -17_179_869,
            accel2: 0,
            clear: Some(0),
        };
        assert_eq!(
            cmd_low_level_move_timed(&mv).unwrap().text(),
            "LT,25000,17179869,0,-17179869,0,0"
        );
        assert_invalid(cmd_low_level_move_timed(&TimedLowLevelMove {
            intervals: 0,
            ..mv
        }));
    }

    #[test]
    fn pulse_configure() {
        assert_eq!(cmd_pulse_configure(&[(10, 100)]).unwrap().text(), "PC,10,100");
        assert_eq!(
            cmd_pulse_configure(&[(1, 2), (3, 4), (5, 6), (7, 8)])
                .unwrap()
                .text(),
            "PC,1,2,3,4,5,6,7,8"
        );
        assert_invalid(cmd_pulse_configure(&[]));
        assert_invalid(cmd_pulse_configure(&[(1, 2); 5]));
        assert_eq!(cmd_pulse_go(true).text(), "PG,1");
    }

    #[test]
    fn servo_output() {
        assert_eq!(cmd_servo_output(15000, 4, None, None).unwrap().text(), "S2,15000,4");
        assert_eq!(
            cmd_servo_output(15000, 24, Some(50), Some(200)).unwrap().text(),
            "S2,15000,24,50,200"
        );
        assert_invalid(cmd_servo_output(15000, 25, None, None));
        assert_invalid(cmd_servo_output(15000, 4, None, Some(200)));
    }

    #[test]
    fn engraver() {
        assert_eq!(cmd_set_engraver(false, None, None).unwrap().text(), "SE,0");
        assert_eq!(
            cmd_set_engraver(true, Some(1023), Some(true)).unwrap().text(),
            "SE,1,1023,1"
        );
        assert_invalid(cmd_set_engraver(true, Some(1024), None));
        assert_invalid(cmd_set_engraver(true, None, Some(false)));
    }

    #[test]
    fn pen_commands() {
        assert_eq!(cmd_set_pen_state(PenState::Up, None, None).unwrap().text(), "SP,1");
        assert_eq!(
            cmd_set_pen_state(PenState::Down, Some(250), Some(4))
                .unwrap()
                .text(),
            "SP,0,250,4"
        );
        assert_invalid(cmd_set_pen_state(PenState::Down, None, Some(4)));
        assert_invalid(cmd_set_pen_state(PenState::Down, Some(250), Some(8)));
        assert_eq!(cmd_toggle_pen(None).text(), "TP");
        assert_eq!(cmd_toggle_pen(Some(500)).text(), "TP,500");
    }

    #[test]
    fn layer_and_nodes() {
        assert_eq!(cmd_set_layer(127).unwrap().text(), "SL,127");
        assert_invalid(cmd_set_layer(128));
        assert_eq!(cmd_set_node_count(u32::MAX).text(), "SN,4294967295");
        assert_eq!(cmd_node_count_increment().text(), "NI");
        assert_eq!(cmd_node_count_decrement().text(), "ND");
    }

    #[test]
    fn configure_commands() {
        assert_eq!(cmd_stepper_servo_configure(4, 20000).unwrap().text(), "SC,4,20000");
        assert_invalid(cmd_stepper_servo_configure(0, 1));
        assert_eq!(cmd_configure_user_options(1, 0).unwrap().text(), "CU,1,0");
        assert_invalid(cmd_configure_user_options(0, 1));
    }

    #[test]
    fn nickname_and_timers() {
        assert_eq!(cmd_set_nickname("plotter-1").unwrap().wire(), "ST,plotter-1\r");
        assert_invalid(cmd_set_nickname("way too long a nickname"));
        assert_invalid(cmd_set_nickname("a,b"));
        assert_eq!(
            cmd_set_servo_power_timeout(60000, Some(true)).text(),
            "SR,60000,1"
        );
        assert_eq!(cmd_set_servo_power_timeout(0, None).text(), "SR,0");
        assert_eq!(
            cmd_timed_read(100, TimedReadMode::Analog).unwrap().text(),
            "T,100,1"
        );
        assert_invalid(cmd_timed_read(0, TimedReadMode::Digital));
        assert_invalid(cmd_timed_read(32768, TimedReadMode::Digital));
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(cmd_reboot().expected_lines(), 0);
        assert_eq!(cmd_reset().expected_lines(), 1);
        assert_eq!(cmd_query_motors().expected_lines(), 1);
        assert_eq!(cmd_query_general().expected_lines(), 1);
        assert_eq!(cmd_query_pen().expected_lines(), 2);
        assert_eq!(cmd_emergency_stop(false).expected_lines(), 2);
        assert_eq!(cmd_emergency_stop(true).text(), "ES,1");
        assert_eq!(cmd_version().expected_lines(), 1);
    }

    // ---------------------------------------------------------------
    // Response parsing verification
    // ---------------------------------------------------------------

    #[test]
    fn analog_report() {
        let readings = parse_analog(&lines(&["A,00:0713,02:0241,05:0089,09:1004"])).unwrap();
        let pairs: Vec<(u8, u16)> = readings.into_iter().collect();
        assert_eq!(pairs, vec![(0, 713), (2, 241), (5, 89), (9, 1004)]);
    }

    #[test]
    fn analog_report_orders_channels() {
        let readings = parse_analog(&lines(&["A,09:0001,03:0002"])).unwrap();
        assert_eq!(readings.keys().copied().collect::<Vec<_>>(), vec![3, 9]);
    }

    #[test]
    fn analog_report_empty_and_bad() {
        assert!(parse_analog(&lines(&["A"])).unwrap().is_empty());
        assert!(matches!(
            parse_analog(&lines(&["A,00-0713"])),
            Err(Error::Protocol(_))
        ));
        assert!(parse_analog(&lines(&["A,00:1024"])).is_err());
        assert!(parse_analog(&lines(&["B,00:0001"])).is_err());
        assert!(matches!(
            parse_analog(&lines(&["A,00:0001,00:0002"])),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn motor_status() {
        let status = parse_motor_status(&lines(&["QM,1,1,1,1"])).unwrap();
        assert_eq!(
            status,
            MotorStatus {
                executing_motion: true,
                motor_moving: [true, true],
                fifo_empty: false,
            }
        );
        let idle = parse_motor_status(&lines(&["QM,0,0,0,0"])).unwrap();
        assert!(idle.fifo_empty);
        assert!(parse_motor_status(&lines(&["QM,1,1,1"])).is_err());
        assert!(parse_motor_status(&lines(&["QX,1,1,1,1"])).is_err());
    }

    #[test]
    fn general_status() {
        let status = parse_general_status(&lines(&["3E"])).unwrap();
        assert_eq!(
            status,
            GeneralStatus {
                pin_rb5: false,
                pin_rb2: false,
                button_prg: true,
                pen_down: true,
                command_executing: true,
                motor1_moving: true,
                motor2_moving: true,
                fifo_empty: true,
            }
        );
        let busy = parse_general_status(&lines(&["C1"])).unwrap();
        assert!(busy.pin_rb5 && busy.pin_rb2 && !busy.fifo_empty);
        assert!(parse_general_status(&lines(&["3"])).is_err());
        assert!(parse_general_status(&lines(&["ZZ"])).is_err());
        assert!(matches!(
            parse_general_status(&lines(&["+F"])),
            Err(Error::Protocol(_))
        ));
        assert!(parse_general_status(&lines(&["-1"])).is_err());
    }

    #[test]
    fn input_reports() {
        let values = parse_input(&lines(&["I,001,255,000,128,007"])).unwrap();
        assert_eq!(values.as_array(), [1, 255, 0, 128, 7]);
        assert!(parse_pin_input(&lines(&["PI,1"])).unwrap());
        assert!(!parse_pin_input(&lines(&["PI,0"])).unwrap());
        assert_eq!(parse_memory_read(&lines(&["MR,42"])).unwrap(), 42);
        assert!(parse_memory_read(&lines(&["MR,300"])).is_err());
        assert!(parse_memory_read(&lines(&["MR,+5"])).is_err());
    }

    #[test]
    fn data_replies_require_ok() {
        assert!(parse_pen_state(&lines(&["1", "OK"])).is_ok());
        assert!(matches!(
            parse_pen_state(&lines(&["1", "NO"])),
            Err(Error::Protocol(_))
        ));
        assert!(parse_pen_state(&lines(&["1"])).is_err());
    }

    #[test]
    fn pen_state() {
        assert_eq!(parse_pen_state(&lines(&["0", "OK"])).unwrap(), PenState::Down);
        assert_eq!(parse_pen_state(&lines(&["1", "OK"])).unwrap(), PenState::Up);
        assert!(parse_pen_state(&lines(&["2", "OK"])).is_err());
    }

    #[test]
    fn emergency_stop_report() {
        let report = parse_emergency_stop(&lines(&["1,100,-50,20,0", "OK"])).unwrap();
        assert_eq!(
            report,
            EStopReport {
                interrupted: true,
                fifo_steps: [100, -50],
                steps_remaining: [20, 0],
            }
        );
        assert!(parse_emergency_stop(&lines(&["1,2,3", "OK"])).is_err());
    }

    #[test]
    fn query_values() {
        assert!(parse_data_flag(&lines(&["1", "OK"])).unwrap());
        assert_eq!(parse_data_integer::<u8>(&lines(&["12", "OK"])).unwrap(), 12);
        assert_eq!(
            parse_data_integer::<u32>(&lines(&["4000000000", "OK"])).unwrap(),
            4_000_000_000
        );
        assert_eq!(
            parse_motor_enables(&lines(&["0,4", "OK"])).unwrap(),
            MotorEnables { motor1: 0, motor2: 4 }
        );
        assert_eq!(
            parse_step_position(&lines(&["1024,-200", "OK"])).unwrap(),
            StepPosition {
                motor1: 1024,
                motor2: -200
            }
        );
        assert_eq!(parse_nickname(&lines(&["East", "OK"])).unwrap(), "East");
        assert_eq!(parse_nickname(&lines(&["", "OK"])).unwrap(), "");
    }

    #[test]
    fn current_conversion() {
        let original = parse_current(&lines(&["0394,0300", "OK"]), HardwareRevision::Original).unwrap();
        assert!((original.motor_current - 0.7221).abs() < 1e-3);
        assert!((original.supply_voltage - 10.945).abs() < 1e-3);

        let revised = parse_current(&lines(&["0394,0300", "OK"]), HardwareRevision::Revised).unwrap();
        assert!((revised.supply_voltage - 9.2032).abs() < 1e-3);
        assert_eq!(revised.motor_current, original.motor_current);

        assert!(parse_current(&lines(&["0394,2000", "OK"]), HardwareRevision::Original).is_err());
    }

    #[test]
    fn version_banner() {
        let banner = "EBBv13_and_above EB Firmware Version 2.8.1";
        assert_eq!(parse_version(&lines(&[banner])).unwrap(), banner);
        assert!(parse_version(&lines(&[""])).is_err());
    }
}
