//! Pololu Maestro serial servo controller.
//!
//! The board speaks a compact binary protocol over a character stream: one
//! opcode byte followed by up to three data bytes, with fixed per-opcode
//! command and response lengths. Servo targets are 14-bit quantities in
//! quarter-microsecond units, split little-endian into two 7-bit bytes.
//!
//! [`MaestroController`] fans one speed or steering level out to every
//! engine and steering channel configured on the board, each with its own
//! calibration. It is strictly open-loop: a command is written and the call
//! returns; the board is never waited on.

use std::io::{Read, Write};
use std::time::Duration;

use rovd_types::{
    DriveError, MaestroCalibration, SpeedLevel, SteeringLevel,
    calib::{EngineCalibration, SteeringCalibration},
};
use tracing::{debug, error};

use crate::actuator::Actuator;

/// Maximum command frame length in bytes.
pub const MAX_COMMAND_LEN: usize = 4;
/// Maximum response length in bytes.
pub const MAX_RESPONSE_LEN: usize = 2;

/// Maestro opcodes. The set is closed, so every opcode carries a
/// well-defined command and response length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    SetTarget = 0x84,
    SetSpeed = 0x87,
    SetAcceleration = 0x89,
    GetPosition = 0x90,
    GetMovingState = 0x93,
    GetErrors = 0xA1,
    GoHome = 0xA2,
}

impl Opcode {
    /// Command frame length, opcode byte included.
    pub const fn command_len(self) -> usize {
        match self {
            Opcode::SetTarget | Opcode::SetSpeed | Opcode::SetAcceleration => 4,
            Opcode::GetPosition => 2,
            Opcode::GetMovingState | Opcode::GetErrors | Opcode::GoHome => 1,
        }
    }

    /// Expected response length.
    pub const fn response_len(self) -> usize {
        match self {
            Opcode::SetTarget | Opcode::SetSpeed | Opcode::SetAcceleration | Opcode::GoHome => 0,
            Opcode::GetPosition | Opcode::GetErrors => 2,
            Opcode::GetMovingState => 1,
        }
    }
}

/// Split a target value into its little-endian 7-bit byte pair.
pub const fn target_bytes(target: i32) -> (u8, u8) {
    ((target & 0x7F) as u8, ((target >> 7) & 0x7F) as u8)
}

/// Assemble a two-byte little-endian response into a value.
pub const fn response_value(response: [u8; MAX_RESPONSE_LEN]) -> i32 {
    ((response[1] as i32) << 8) | response[0] as i32
}

/// Write one command frame and, when the opcode expects it, read exactly the
/// fixed response length. Any write or read failure is logged at error
/// severity and yields an all-zero response.
fn transact<P: Read + Write>(
    port: &mut P,
    opcode: Opcode,
    data: [u8; MAX_COMMAND_LEN - 1],
) -> [u8; MAX_RESPONSE_LEN] {
    let mut response = [0u8; MAX_RESPONSE_LEN];

    let mut frame = [0u8; MAX_COMMAND_LEN];
    frame[0] = opcode as u8;
    frame[1..].copy_from_slice(&data);
    let len = opcode.command_len();

    if let Err(e) = port.write_all(&frame[..len]) {
        error!(opcode = frame[0], error = %e, "couldn't send command to maestro");
        return response;
    }
    debug!(frame = ?&frame[..len], "maestro command sent");

    let expected = opcode.response_len();
    if expected > 0 {
        if let Err(e) = port.read_exact(&mut response[..expected]) {
            error!(opcode = frame[0], error = %e, "couldn't read response from maestro");
            return [0u8; MAX_RESPONSE_LEN];
        }
        debug!(response = ?&response[..expected], "maestro response received");
    }

    response
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

/// Drives every configured engine and steering channel of one Maestro
/// board.
///
/// Generic over the port so tests substitute an in-memory double; the
/// production controller is [`SerialMaestro`]. A controller with no open
/// port, or with an empty engine or steering list, is not sane: every
/// operation is a no-op and the getters return the neutral levels.
pub struct MaestroController<P: Read + Write> {
    name: String,
    port: Option<P>,
    engines: Vec<EngineCalibration>,
    steering: Vec<SteeringCalibration>,
    speed: SpeedLevel,
    steering_level: SteeringLevel,
}

/// The production controller over a [`serialport`] device.
pub type SerialMaestro = MaestroController<Box<dyn serialport::SerialPort>>;

impl SerialMaestro {
    /// Open the configured serial device and drive every channel to
    /// neutral. `serialport` opens the device in raw mode, so no echo or
    /// line discipline interferes with the binary frames.
    ///
    /// An unopenable device is logged and leaves the controller permanently
    /// not-sane.
    pub fn open(calibration: &MaestroCalibration) -> Self {
        let port = match serialport::new(calibration.device.as_str(), 115_200)
            .timeout(Duration::from_millis(500))
            .open()
        {
            Ok(port) => Some(port),
            Err(e) => {
                error!(device = %calibration.device, error = %e, "couldn't open maestro device");
                None
            }
        };
        Self::from_port_opt(port, calibration)
    }
}

impl<P: Read + Write> MaestroController<P> {
    /// Build a controller around an already opened port and drive every
    /// channel to neutral.
    pub fn from_port(port: P, calibration: &MaestroCalibration) -> Self {
        Self::from_port_opt(Some(port), calibration)
    }

    fn from_port_opt(port: Option<P>, calibration: &MaestroCalibration) -> Self {
        let mut controller = MaestroController {
            name: format!("maestro {}", calibration.device),
            port,
            engines: calibration.engines.clone(),
            steering: calibration.steering.clone(),
            speed: SpeedLevel::STOP,
            steering_level: SteeringLevel::STRAIGHT,
        };
        if controller.is_sane() {
            // Come up stopped and centred.
            controller.push_speed(SpeedLevel::STOP);
            controller.push_steering(SteeringLevel::STRAIGHT);
        }
        controller
    }

    fn is_sane(&self) -> bool {
        self.port.is_some() && !self.engines.is_empty() && !self.steering.is_empty()
    }

    /// One set-target frame per engine, plus one per direction channel on
    /// engines that have one (skipped at neutral, where the direction
    /// signal is left unchanged).
    fn push_speed(&mut self, speed: SpeedLevel) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        for engine in &self.engines {
            let (low, high) = target_bytes(engine.level_to_target(speed));
            transact(port, Opcode::SetTarget, [engine.channel, low, high]);

            if let (Some(channel), Some(direction)) =
                (engine.direction_channel, engine.direction_target(speed))
            {
                let (low, high) = target_bytes(direction);
                transact(port, Opcode::SetTarget, [channel, low, high]);
            }
        }
    }

    /// One set-target frame per steering servo.
    fn push_steering(&mut self, steering: SteeringLevel) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        for servo in &self.steering {
            let (low, high) = target_bytes(servo.level_to_target(steering));
            transact(port, Opcode::SetTarget, [servo.channel, low, high]);
        }
    }

    /// Read back the current target of `channel` in quarter-microsecond
    /// units, `None` when the device is not open.
    pub fn query_position(&mut self, channel: u8) -> Option<i32> {
        let port = self.port.as_mut()?;
        Some(response_value(transact(
            port,
            Opcode::GetPosition,
            [channel, 0, 0],
        )))
    }

    /// Error bits accumulated by the board since the last query.
    pub fn query_errors(&mut self) -> u16 {
        match self.port.as_mut() {
            Some(port) => response_value(transact(port, Opcode::GetErrors, [0, 0, 0])) as u16,
            None => 0,
        }
    }

    /// Whether any servo output is still slewing toward its target.
    pub fn is_moving(&mut self) -> bool {
        match self.port.as_mut() {
            Some(port) => transact(port, Opcode::GetMovingState, [0, 0, 0])[0] != 0,
            None => false,
        }
    }

    /// Send every channel to its board-configured home position.
    pub fn go_home(&mut self) {
        if let Some(port) = self.port.as_mut() {
            transact(port, Opcode::GoHome, [0, 0, 0]);
        }
    }
}

impl<P: Read + Write + Send> Actuator for MaestroController<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DriveError> {
        // The board is live as soon as the device is open; construction
        // already drove it to neutral.
        Ok(())
    }

    fn stop(&mut self) {
        if self.is_sane() {
            self.push_speed(SpeedLevel::STOP);
            self.push_steering(SteeringLevel::STRAIGHT);
            self.speed = SpeedLevel::STOP;
            self.steering_level = SteeringLevel::STRAIGHT;
        }
    }

    fn speed(&self) -> SpeedLevel {
        if self.is_sane() {
            self.speed
        } else {
            SpeedLevel::STOP
        }
    }

    fn set_speed(&mut self, speed: SpeedLevel) -> Result<(), DriveError> {
        if !self.is_sane() {
            return Ok(());
        }
        self.speed = speed;
        self.push_speed(speed);
        Ok(())
    }

    fn steering(&self) -> SteeringLevel {
        if self.is_sane() {
            self.steering_level
        } else {
            SteeringLevel::STRAIGHT
        }
    }

    fn set_steering(&mut self, steering: SteeringLevel) -> Result<(), DriveError> {
        if !self.is_sane() {
            return Ok(());
        }
        self.steering_level = steering;
        self.push_steering(steering);
        Ok(())
    }
}

impl<P: Read + Write> Drop for MaestroController<P> {
    fn drop(&mut self) {
        // Dropping the port closes the device; leave the vehicle neutral
        // first.
        if self.is_sane() {
            debug!(name = %self.name, "maestro controller shutting down");
            self.push_speed(SpeedLevel::STOP);
            self.push_steering(SteeringLevel::STRAIGHT);
        }
    }
}
