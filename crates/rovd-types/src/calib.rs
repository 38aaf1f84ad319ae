//! Per-actuator calibration records.
//!
//! A calibration maps a discrete level onto the physical value a backend
//! understands: a serial target in quarter-microsecond units for the Maestro
//! board, or a duty-cycle percentage of the PWM period for GPIO-driven
//! actuators. The mapping functions are pure and total over the level range;
//! only physical values are ever clamped, levels never are.
//!
//! All records derive serde so the configuration file maps onto them
//! directly.

use serde::{Deserialize, Serialize};

use crate::level::{SpeedLevel, SteeringLevel};

fn default_forward() -> bool {
    true
}

// ────────────────────────────────────────────────────────────────────────────
// Serial (Maestro) calibrations
// ────────────────────────────────────────────────────────────────────────────

/// Calibration of one serially driven engine, in quarter-microsecond target
/// units (a 1500 µs pulse is the target value 6000).
///
/// Engines without a direction channel encode direction in the target
/// itself (`stop + level·step`). Engines with a direction channel receive
/// the magnitude only (`stop + |level|·step`) while the sign is conveyed by
/// writing one of two constant targets to [`direction_channel`][Self::direction_channel].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCalibration {
    /// Controller channel the engine is wired to.
    pub channel: u8,
    /// Target at level 0.
    pub stop: i32,
    /// Target delta per level step.
    pub step: i32,
    /// Whether positive levels spin this engine forward. A reversed engine
    /// swaps the two direction-channel constants.
    #[serde(default = "default_forward")]
    pub forward: bool,
    /// Channel carrying the direction signal, if the ESC has one.
    #[serde(default)]
    pub direction_channel: Option<u8>,
    /// Direction-channel target selecting forward rotation.
    #[serde(default = "default_direction_forward")]
    pub direction_forward: i32,
    /// Direction-channel target selecting reverse rotation.
    #[serde(default = "default_direction_reverse")]
    pub direction_reverse: i32,
}

fn default_direction_forward() -> i32 {
    2000 * 4
}

fn default_direction_reverse() -> i32 {
    1000 * 4
}

impl EngineCalibration {
    /// Physical target for `level`.
    pub fn level_to_target(&self, level: SpeedLevel) -> i32 {
        let l = i32::from(level.value());
        match self.direction_channel {
            Some(_) => self.stop + l.abs() * self.step,
            None => self.stop + l * self.step,
        }
    }

    /// Inverse of [`level_to_target`][Self::level_to_target].
    ///
    /// The difference is divided by `step` truncating toward zero (Rust's
    /// native integer division), so a target partway between two levels
    /// resolves to the one nearer neutral. For direction-channel engines
    /// only the magnitude is recoverable.
    pub fn target_to_level(&self, target: i32) -> SpeedLevel {
        if self.step == 0 {
            return SpeedLevel::STOP;
        }
        let l = ((target - self.stop) / self.step).clamp(-10, 10);
        SpeedLevel::new(l as i8).unwrap_or(SpeedLevel::STOP)
    }

    /// Direction-channel target for `level`, `None` at neutral (the
    /// direction signal is left unchanged when the engine is stopped).
    pub fn direction_target(&self, level: SpeedLevel) -> Option<i32> {
        self.direction_channel?;
        if level.is_stopped() {
            return None;
        }
        let ahead = (level.value() > 0) == self.forward;
        Some(if ahead {
            self.direction_forward
        } else {
            self.direction_reverse
        })
    }
}

/// Calibration of one serially driven steering servo, in quarter-microsecond
/// target units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringCalibration {
    /// Controller channel the servo is wired to.
    pub channel: u8,
    /// Target at level 0 (rudder centred).
    pub straight: i32,
    /// Target delta per level step; positive steps steer right.
    pub step: i32,
}

impl SteeringCalibration {
    /// Physical target for `level`.
    pub fn level_to_target(&self, level: SteeringLevel) -> i32 {
        self.straight + i32::from(level.value()) * self.step
    }

    /// Inverse of [`level_to_target`][Self::level_to_target], truncating
    /// toward zero.
    pub fn target_to_level(&self, target: i32) -> SteeringLevel {
        if self.step == 0 {
            return SteeringLevel::STRAIGHT;
        }
        let l = ((target - self.straight) / self.step).clamp(-10, 10);
        SteeringLevel::new(l as i8).unwrap_or(SteeringLevel::STRAIGHT)
    }
}

/// One Maestro board: the serial device plus every channel it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaestroCalibration {
    /// Serial device path, e.g. `/dev/ttyACM0`.
    pub device: String,
    #[serde(default)]
    pub engines: Vec<EngineCalibration>,
    #[serde(default)]
    pub steering: Vec<SteeringCalibration>,
}

// ────────────────────────────────────────────────────────────────────────────
// GPIO calibrations
// ────────────────────────────────────────────────────────────────────────────

/// How direction is conveyed on a GPIO-driven engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseMode {
    /// Only magnitude is driven; reverse is not representable.
    #[default]
    NoReverse,
    /// One line encodes direction and magnitude around a neutral duty cycle.
    SameLine,
    /// Magnitude on the PWM line, direction on a dedicated binary line.
    DedicatedLine,
}

/// Calibration of one GPIO-driven engine.
///
/// When [`pwm_device`][Self::pwm_device] is set the engine uses the kernel
/// pulse generator at that sysfs path; otherwise a software pulse thread
/// drives [`line`][Self::line] on [`chip`][Self::chip].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioEngineCalibration {
    /// GPIO character device, e.g. `/dev/gpiochip0`.
    pub chip: String,
    /// Engine line offset for software timing.
    #[serde(default)]
    pub line: u32,
    /// Kernel PWM chip path, e.g. `/sys/class/pwm/pwmchip0`; enables
    /// hardware timing when present.
    #[serde(default)]
    pub pwm_device: Option<String>,
    /// Channel index below [`pwm_device`][Self::pwm_device].
    #[serde(default)]
    pub pwm_channel: u32,
    /// Direction line offset, used in [`ReverseMode::DedicatedLine`] only.
    #[serde(default)]
    pub direction_line: u32,
    /// PWM period in microseconds.
    pub pwm_period: u64,
    /// Minimum duty cycle in percent of the period.
    #[serde(default = "default_engine_min_duty")]
    pub min_duty: u32,
    /// Maximum duty cycle in percent of the period.
    #[serde(default = "default_engine_max_duty")]
    pub max_duty: u32,
    #[serde(default)]
    pub reverse_mode: ReverseMode,
    /// Whether positive levels spin this engine forward.
    #[serde(default = "default_forward")]
    pub forward: bool,
    /// Logic level asserted on the direction line for forward rotation.
    #[serde(default = "default_direction_forward_level")]
    pub direction_forward_level: u8,
    /// Logic level asserted on the direction line for reverse rotation.
    #[serde(default)]
    pub direction_reverse_level: u8,
}

fn default_engine_min_duty() -> u32 {
    10
}

fn default_engine_max_duty() -> u32 {
    90
}

fn default_direction_forward_level() -> u8 {
    1
}

impl GpioEngineCalibration {
    /// Duty cycle in percent of the period for `level`.
    pub fn duty_percent(&self, level: SpeedLevel) -> u64 {
        let l = i64::from(level.value());
        let min = i64::from(self.min_duty);
        let max = i64::from(self.max_duty);
        match self.reverse_mode {
            ReverseMode::SameLine => {
                let neutral = min + (max - min) / 2;
                (neutral + l * (max - neutral) / 10).clamp(min, max) as u64
            }
            // Dedicated-line engines drive magnitude only here; the sign
            // travels on the direction line.
            ReverseMode::NoReverse | ReverseMode::DedicatedLine => {
                (min + l.abs() * (max - min) / 10) as u64
            }
        }
    }

    /// High-time in microseconds for `level`.
    pub fn pulse_width(&self, level: SpeedLevel) -> u64 {
        self.duty_percent(level) * self.pwm_period / 100
    }

    /// High-time in microseconds at the minimum duty cycle, programmed as
    /// the armed-idle value when the hardware generator starts.
    pub fn min_pulse_width(&self) -> u64 {
        u64::from(self.min_duty) * self.pwm_period / 100
    }

    /// Logic level for the direction line, `None` at neutral (the line is
    /// left unchanged when the engine is stopped).
    pub fn direction_level(&self, level: SpeedLevel) -> Option<bool> {
        if self.reverse_mode != ReverseMode::DedicatedLine || level.is_stopped() {
            return None;
        }
        let ahead = (level.value() > 0) == self.forward;
        Some(if ahead {
            self.direction_forward_level != 0
        } else {
            self.direction_reverse_level != 0
        })
    }
}

/// Calibration of one GPIO-driven steering servo.
///
/// Steering is always bidirectional around a neutral duty cycle. For extra
/// resolution the percentages are scaled by ten before the neutral
/// arithmetic, and the final period division compensates with 1000 instead
/// of 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioSteeringCalibration {
    /// GPIO character device, e.g. `/dev/gpiochip0`.
    pub chip: String,
    /// Steering line offset for software timing.
    #[serde(default)]
    pub line: u32,
    /// Kernel PWM chip path; enables hardware timing when present.
    #[serde(default)]
    pub pwm_device: Option<String>,
    /// Channel index below [`pwm_device`][Self::pwm_device].
    #[serde(default)]
    pub pwm_channel: u32,
    /// PWM period in microseconds.
    pub pwm_period: u64,
    /// Minimum duty cycle in percent of the period.
    #[serde(default = "default_steering_min_duty")]
    pub min_duty: u32,
    /// Maximum duty cycle in percent of the period.
    #[serde(default = "default_steering_max_duty")]
    pub max_duty: u32,
}

fn default_steering_min_duty() -> u32 {
    10
}

fn default_steering_max_duty() -> u32 {
    20
}

impl GpioSteeringCalibration {
    /// Duty cycle for `level` in tenths of a percent of the period.
    pub fn duty_tenths(&self, level: SteeringLevel) -> u64 {
        let l = i64::from(level.value());
        let min = i64::from(self.min_duty) * 10;
        let max = i64::from(self.max_duty) * 10;
        let neutral = min + (max - min) / 2;
        (neutral + l * (max - neutral) / 10).clamp(min, max) as u64
    }

    /// High-time in microseconds for `level`.
    pub fn pulse_width(&self, level: SteeringLevel) -> u64 {
        self.duty_tenths(level) * self.pwm_period / 1000
    }

    /// High-time at the centred position, programmed when the hardware
    /// generator starts so the servo comes up straight.
    pub fn neutral_pulse_width(&self) -> u64 {
        self.pulse_width(SteeringLevel::STRAIGHT)
    }
}

/// One auxiliary on/off output line (the cooling relay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// GPIO character device, e.g. `/dev/gpiochip0`.
    pub chip: String,
    /// Output line offset.
    pub line: u32,
}
