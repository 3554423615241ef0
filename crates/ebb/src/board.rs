//! EbbBoard -- one async method per EBB operation.
//!
//! Each method encodes and validates its command through [`commands`],
//! queues it on the IO task, and decodes the collected reply lines. The IO
//! task owns the transport, so a board can be shared behind an `Arc` and
//! called from several tasks; commands still reach the wire one at a time in
//! call order.

use ebb_core::error::Result;
use ebb_io::io::BoardIo;
use ebb_io::protocol::{self, Command};
use tracing::debug;

use crate::commands;
use crate::types::{
    AnalogReadings, EStopReport, GeneralStatus, HardwareRevision, LowLevelMove, MotorEnables,
    MotorStatus, PenState, PinDirection, Port, PortValues, StepPosition, SupplyReading,
    TimedLowLevelMove, TimedReadMode,
};

/// A connected EiBotBoard.
///
/// Constructed via [`EbbBuilder`](crate::builder::EbbBuilder). Dropping the
/// board stops its IO task; use [`disconnect`](Self::disconnect) to also
/// close the transport cleanly.
pub struct EbbBoard {
    io: BoardIo,
}

impl EbbBoard {
    pub(crate) fn new(io: BoardIo) -> Self {
        EbbBoard { io }
    }

    /// Queue an already-encoded command and return its raw reply lines.
    ///
    /// Useful for firmware commands without a dedicated method.
    pub async fn execute(&self, cmd: &Command) -> Result<Vec<String>> {
        self.io.send(cmd).await
    }

    async fn ack(&self, cmd: Command) -> Result<()> {
        let lines = self.execute(&cmd).await?;
        protocol::expect_ack(&lines)
    }

    /// Stop the IO task after queued commands finish, then disconnect the
    /// transport.
    pub async fn disconnect(self) -> Result<()> {
        let mut transport = self.io.shutdown().await?;
        debug!("EBB IO task stopped, disconnecting transport");
        transport.disconnect().await
    }

    // -----------------------------------------------------------------
    // Analog and digital I/O
    // -----------------------------------------------------------------

    /// Read all enabled analog channels (`A`).
    pub async fn analog_value_get(&self) -> Result<AnalogReadings> {
        let lines = self.execute(&commands::cmd_analog_value_get()).await?;
        commands::parse_analog(&lines)
    }

    /// Enable or disable one analog channel (`AC`).
    pub async fn analog_configure(&self, channel: u8, enabled: bool) -> Result<()> {
        self.ack(commands::cmd_analog_configure(channel, enabled)?).await
    }

    /// Set the TRIS (direction) registers of ports A-E (`C`).
    pub async fn configure_pins(&self, tris: PortValues) -> Result<()> {
        self.ack(commands::cmd_configure_pins(tris)).await
    }

    /// Read ports A-E (`I`).
    pub async fn input(&self) -> Result<PortValues> {
        let lines = self.execute(&commands::cmd_input()).await?;
        commands::parse_input(&lines)
    }

    /// Write ports A-E (`O`).
    pub async fn output(&self, values: PortValues) -> Result<()> {
        self.ack(commands::cmd_output(values)).await
    }

    pub async fn pin_direction(&self, port: Port, pin: u8, direction: PinDirection) -> Result<()> {
        self.ack(commands::cmd_pin_direction(port, pin, direction)?)
            .await
    }

    /// Read a single pin (`PI`). Returns `true` when the pin is high.
    pub async fn pin_input(&self, port: Port, pin: u8) -> Result<bool> {
        let lines = self.execute(&commands::cmd_pin_input(port, pin)?).await?;
        commands::parse_pin_input(&lines)
    }

    pub async fn pin_output(&self, port: Port, pin: u8, high: bool) -> Result<()> {
        self.ack(commands::cmd_pin_output(port, pin, high)?).await
    }

    /// Configure RB0-RB3 pulse trains (`PC`).
    pub async fn pulse_configure(&self, channels: &[(u16, u16)]) -> Result<()> {
        self.ack(commands::cmd_pulse_configure(channels)?).await
    }

    /// Start or stop the configured pulse trains (`PG`).
    pub async fn pulse_go(&self, on: bool) -> Result<()> {
        self.ack(commands::cmd_pulse_go(on)).await
    }

    /// Start or stop periodic reporting of inputs (`T`).
    pub async fn timed_read(&self, duration_ms: u16, mode: TimedReadMode) -> Result<()> {
        self.ack(commands::cmd_timed_read(duration_ms, mode)?).await
    }

    pub async fn memory_read(&self, address: u16) -> Result<u8> {
        let lines = self.execute(&commands::cmd_memory_read(address)?).await?;
        commands::parse_memory_read(&lines)
    }

    pub async fn memory_write(&self, address: u16, value: u8) -> Result<()> {
        self.ack(commands::cmd_memory_write(address, value)?).await
    }

    // -----------------------------------------------------------------
    // Motors
    // -----------------------------------------------------------------

    /// Enable or disable the stepper drivers (`EM`).
    pub async fn enable_motors(&self, enable1: u8, enable2: u8) -> Result<()> {
        self.ack(commands::cmd_enable_motors(enable1, enable2)).await
    }

    /// Abort all motion immediately (`ES`) and report what was discarded.
    pub async fn emergency_stop(&self, disable_motors: bool) -> Result<EStopReport> {
        let lines = self
            .execute(&commands::cmd_emergency_stop(disable_motors))
            .await?;
        commands::parse_emergency_stop(&lines)
    }

    /// Move both motors to home, or to an absolute position (`HM`).
    pub async fn home_move(&self, rate: u32, position: Option<(i32, i32)>) -> Result<()> {
        self.ack(commands::cmd_home_move(rate, position)?).await
    }

    pub async fn low_level_move(&self, mv: &LowLevelMove) -> Result<()> {
        self.ack(commands::cmd_low_level_move(mv)?).await
    }

    pub async fn low_level_move_timed(&self, mv: &TimedLowLevelMove) -> Result<()> {
        self.ack(commands::cmd_low_level_move_timed(mv)?).await
    }

    /// Queue a timed move on both axes (`SM`).
    pub async fn stepper_move(&self, duration_ms: u32, steps1: i32, steps2: Option<i32>) -> Result<()> {
        self.ack(commands::cmd_stepper_move(duration_ms, steps1, steps2)?)
            .await
    }

    /// Queue a timed move in mixed-axis (A = 1+2, B = 1-2) geometry (`XM`).
    pub async fn stepper_move_mixed_axis(
        &self,
        duration_ms: u32,
        a_steps: i32,
        b_steps: i32,
    ) -> Result<()> {
        self.ack(commands::cmd_stepper_move_mixed_axis(
            duration_ms,
            a_steps,
            b_steps,
        )?)
        .await
    }

    pub async fn clear_step_position(&self) -> Result<()> {
        self.ack(commands::cmd_clear_step_position()).await
    }

    pub async fn query_motor_enables(&self) -> Result<MotorEnables> {
        let lines = self.execute(&commands::cmd_query_motor_enables()).await?;
        commands::parse_motor_enables(&lines)
    }

    pub async fn query_motors(&self) -> Result<MotorStatus> {
        let lines = self.execute(&commands::cmd_query_motors()).await?;
        commands::parse_motor_status(&lines)
    }

    pub async fn query_step_position(&self) -> Result<StepPosition> {
        let lines = self.execute(&commands::cmd_query_step_position()).await?;
        commands::parse_step_position(&lines)
    }

    // -----------------------------------------------------------------
    // Pen, servo and engraver
    // -----------------------------------------------------------------

    /// Raise or lower the pen (`SP`).
    pub async fn set_pen_state(
        &self,
        state: PenState,
        duration_ms: Option<u16>,
        pin: Option<u8>,
    ) -> Result<()> {
        self.ack(commands::cmd_set_pen_state(state, duration_ms, pin)?)
            .await
    }

    pub async fn toggle_pen(&self, duration_ms: Option<u16>) -> Result<()> {
        self.ack(commands::cmd_toggle_pen(duration_ms)).await
    }

    pub async fn query_pen(&self) -> Result<PenState> {
        let lines = self.execute(&commands::cmd_query_pen()).await?;
        commands::parse_pen_state(&lines)
    }

    /// Drive an RC servo output (`S2`).
    pub async fn servo_output(
        &self,
        position: u16,
        pin: u8,
        rate: Option<u16>,
        delay_ms: Option<u16>,
    ) -> Result<()> {
        self.ack(commands::cmd_servo_output(position, pin, rate, delay_ms)?)
            .await
    }

    pub async fn stepper_servo_configure(&self, param: u8, value: u16) -> Result<()> {
        self.ack(commands::cmd_stepper_servo_configure(param, value)?)
            .await
    }

    pub async fn set_servo_power_timeout(&self, timeout_ms: u32, power_on: Option<bool>) -> Result<()> {
        self.ack(commands::cmd_set_servo_power_timeout(timeout_ms, power_on))
            .await
    }

    /// Returns `true` while the servo is powered (`QR`).
    pub async fn query_servo_power(&self) -> Result<bool> {
        let lines = self.execute(&commands::cmd_query_servo_power()).await?;
        commands::parse_data_flag(&lines)
    }

    pub async fn set_engraver(
        &self,
        on: bool,
        power: Option<u16>,
        use_motion_queue: Option<bool>,
    ) -> Result<()> {
        self.ack(commands::cmd_set_engraver(on, power, use_motion_queue)?)
            .await
    }

    // -----------------------------------------------------------------
    // Board state and identity
    // -----------------------------------------------------------------

    /// Returns `true` if the PRG button was pressed since the last query (`QB`).
    pub async fn query_button(&self) -> Result<bool> {
        let lines = self.execute(&commands::cmd_query_button()).await?;
        commands::parse_data_flag(&lines)
    }

    /// Read motor current and supply voltage (`QC`).
    ///
    /// The board cannot report its own revision, so the caller supplies it.
    pub async fn query_current(&self, revision: HardwareRevision) -> Result<SupplyReading> {
        let lines = self.execute(&commands::cmd_query_current()).await?;
        commands::parse_current(&lines, revision)
    }

    pub async fn query_general(&self) -> Result<GeneralStatus> {
        let lines = self.execute(&commands::cmd_query_general()).await?;
        commands::parse_general_status(&lines)
    }

    pub async fn set_layer(&self, layer: u8) -> Result<()> {
        self.ack(commands::cmd_set_layer(layer)?).await
    }

    pub async fn query_layer(&self) -> Result<u8> {
        let lines = self.execute(&commands::cmd_query_layer()).await?;
        commands::parse_data_integer(&lines)
    }

    pub async fn set_node_count(&self, count: u32) -> Result<()> {
        self.ack(commands::cmd_set_node_count(count)).await
    }

    pub async fn node_count_increment(&self) -> Result<()> {
        self.ack(commands::cmd_node_count_increment()).await
    }

    pub async fn node_count_decrement(&self) -> Result<()> {
        self.ack(commands::cmd_node_count_decrement()).await
    }

    pub async fn query_node_count(&self) -> Result<u32> {
        let lines = self.execute(&commands::cmd_query_node_count()).await?;
        commands::parse_data_integer(&lines)
    }

    pub async fn set_nickname(&self, name: &str) -> Result<()> {
        self.ack(commands::cmd_set_nickname(name)?).await
    }

    pub async fn query_nickname(&self) -> Result<String> {
        let lines = self.execute(&commands::cmd_query_nickname()).await?;
        commands::parse_nickname(&lines)
    }

    pub async fn configure_user_options(&self, option: u8, value: u8) -> Result<()> {
        self.ack(commands::cmd_configure_user_options(option, value)?)
            .await
    }

    /// Firmware version banner (`V`).
    pub async fn version(&self) -> Result<String> {
        let lines = self.execute(&commands::cmd_version()).await?;
        commands::parse_version(&lines)
    }

    /// Reset the board to its power-on state (`R`).
    pub async fn reset(&self) -> Result<()> {
        self.ack(commands::cmd_reset()).await
    }

    /// Reboot the board (`RB`). Completes once the command is written; the
    /// board drops off the bus without replying.
    pub async fn reboot(&self) -> Result<()> {
        self.execute(&commands::cmd_reboot()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ebb_core::error::Error;
    use ebb_io::io::{IoConfig, spawn_io_task};
    use ebb_test_harness::{MockTransport, SentLog};

    fn board(mock: MockTransport) -> (EbbBoard, SentLog) {
        board_with_timeout(mock, Duration::from_millis(200))
    }

    fn board_with_timeout(mock: MockTransport, timeout: Duration) -> (EbbBoard, SentLog) {
        let log = mock.sent_log();
        let io = spawn_io_task(
            Box::new(mock),
            IoConfig {
                command_timeout: timeout,
                ..IoConfig::default()
            },
        )
        .unwrap();
        (EbbBoard::new(io), log)
    }

    // ---------------------------------------------------------------
    // Validation happens before any write
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_wire() {
        let (board, log) = board(MockTransport::new());

        assert!(matches!(
            board.stepper_move_mixed_axis(0, 1, 1).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            board.pin_output(Port::B, 8, true).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            board.set_nickname("name,with,commas").await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            board.memory_read(4096).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            board.set_layer(200).await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(log.is_empty());
    }

    // ---------------------------------------------------------------
    // Encoded commands and decoded replies
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn enable_motors_writes_exact_command() {
        let mut mock = MockTransport::new();
        mock.expect("EM,16,16\r", &["OK"]);
        let (board, log) = board(mock);

        board.enable_motors(16, 16).await.unwrap();
        assert_eq!(log.entries(), vec!["EM,16,16\r".to_string()]);
    }

    #[tokio::test]
    async fn mixed_axis_move() {
        let mut mock = MockTransport::new();
        mock.expect("XM,1337,100,200\r", &["OK"]);
        let (board, _log) = board(mock);

        board.stepper_move_mixed_axis(1337, 100, 200).await.unwrap();
    }

    #[tokio::test]
    async fn pen_state_round_trip() {
        let mut mock = MockTransport::new();
        mock.expect("SP,0\r", &["OK"]);
        mock.expect("QP\r", &["0", "OK"]);
        mock.expect("SP,1,200\r", &["OK"]);
        mock.expect("QP\r", &["1", "OK"]);
        let (board, _log) = board(mock);

        board.set_pen_state(PenState::Down, None, None).await.unwrap();
        assert_eq!(board.query_pen().await.unwrap(), PenState::Down);
        board
            .set_pen_state(PenState::Up, Some(200), None)
            .await
            .unwrap();
        assert_eq!(board.query_pen().await.unwrap(), PenState::Up);
    }

    #[tokio::test]
    async fn status_queries() {
        let mut mock = MockTransport::new();
        mock.expect("QM\r", &["QM,1,1,1,1"]);
        mock.expect("A\r", &["A,00:0713,02:0241,05:0089,09:1004"]);
        mock.expect("QG\r", &["3E"]);
        mock.expect("QS\r", &["1024,-200", "OK"]);
        let (board, _log) = board(mock);

        let motors = board.query_motors().await.unwrap();
        assert!(motors.executing_motion);
        assert!(!motors.fifo_empty);

        let analog = board.analog_value_get().await.unwrap();
        assert_eq!(analog.get(&9), Some(&1004));
        assert_eq!(analog.len(), 4);

        let general = board.query_general().await.unwrap();
        assert!(general.pen_down);
        assert!(general.fifo_empty);

        let position = board.query_step_position().await.unwrap();
        assert_eq!(position.motor2, -200);
    }

    #[tokio::test]
    async fn query_current_uses_revision() {
        let mut mock = MockTransport::new();
        mock.expect("QC\r", &["0394,0300", "OK"]);
        let (board, _log) = board(mock);

        let reading = board.query_current(HardwareRevision::Revised).await.unwrap();
        assert!((reading.supply_voltage - 9.2032).abs() < 1e-3);
    }

    #[tokio::test]
    async fn reboot_needs_no_reply() {
        let mut mock = MockTransport::new();
        mock.expect_silent("RB\r");
        let (board, log) = board(mock);

        board.reboot().await.unwrap();
        assert_eq!(log.entries(), vec!["RB\r".to_string()]);
    }

    #[tokio::test]
    async fn device_error_line_is_protocol_error() {
        let mut mock = MockTransport::new();
        mock.expect("SC,4,20000\r", &["!8 Err: Unknown command"]);
        mock.expect("V\r", &["EBBv13_and_above EB Firmware Version 2.8.1"]);
        let (board, _log) = board(mock);

        assert!(matches!(
            board.stepper_servo_configure(4, 20000).await,
            Err(Error::Protocol(_))
        ));
        assert!(board.version().await.unwrap().ends_with("2.8.1"));
    }

    #[tokio::test]
    async fn malformed_ack_is_protocol_error() {
        let mut mock = MockTransport::new();
        mock.expect("R\r", &["KO"]);
        let (board, _log) = board(mock);

        assert!(matches!(board.reset().await, Err(Error::Protocol(_))));
    }

    // ---------------------------------------------------------------
    // Queue behaviour through the board API
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_calls_are_served_in_order() {
        let mut mock = MockTransport::new();
        mock.expect_delayed("QB\r", &["1", "OK"], Duration::from_millis(40));
        mock.expect_delayed("QN\r", &["7", "OK"], Duration::from_millis(5));
        mock.expect_delayed("QT\r", &["East", "OK"], Duration::from_millis(20));
        let (board, log) = board(mock);
        let board = Arc::new(board);

        let a = tokio::spawn({
            let board = board.clone();
            async move { board.query_button().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = tokio::spawn({
            let board = board.clone();
            async move { board.query_node_count().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let c = tokio::spawn({
            let board = board.clone();
            async move { board.query_nickname().await }
        });

        assert!(a.await.unwrap().unwrap());
        assert_eq!(b.await.unwrap().unwrap(), 7);
        assert_eq!(c.await.unwrap().unwrap(), "East");
        assert_eq!(
            log.entries(),
            vec!["QB\r".to_string(), "QN\r".to_string(), "QT\r".to_string()]
        );
    }

    #[tokio::test]
    async fn timeout_then_next_command_runs() {
        let mut mock = MockTransport::new();
        mock.expect_silent("QE\r");
        mock.expect("QL\r", &["3", "OK"]);
        let (board, _log) = board_with_timeout(mock, Duration::from_millis(50));

        let start = tokio::time::Instant::now();
        assert!(matches!(
            board.query_motor_enables().await,
            Err(Error::Timeout)
        ));
        assert!(start.elapsed() >= Duration::from_millis(50));

        assert_eq!(board.query_layer().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn disconnect_closes_transport() {
        let mut mock = MockTransport::new();
        mock.expect("CS\r", &["OK"]);
        let (board, _log) = board(mock);

        board.clear_step_position().await.unwrap();
        board.disconnect().await.unwrap();
    }
}
