//! Daemon configuration – `/etc/rovd.toml` by default.
//!
//! The file maps directly onto the calibration records in `rovd-types`;
//! validation runs before any actuator is constructed, so a fleet is only
//! ever built from a configuration known to be coherent.
//!
//! ```toml
//! log_level = "info"
//!
//! [maestro]
//! device = "/dev/ttyACM0"
//!
//! [[maestro.engines]]
//! channel = 0
//! stop = 5880
//! step = 212
//!
//! [[maestro.steering]]
//! channel = 3
//! straight = 6680
//! step = 266
//!
//! [[gpio_engines]]
//! chip = "/dev/gpiochip0"
//! line = 17
//! pwm_period = 100
//! reverse_mode = "same_line"
//!
//! [cooling]
//! chip = "/dev/gpiochip0"
//! line = 5
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use rovd_hal::engine::GpioEngineController;
use rovd_hal::fleet::Fleet;
use rovd_hal::maestro::SerialMaestro;
use rovd_hal::sim::{SimActuator, SimSwitch};
use rovd_hal::steering::GpioSteeringController;
use rovd_hal::switch::GpioSwitch;
use rovd_types::{
    DriveError, GpioEngineCalibration, GpioSteeringCalibration, MaestroCalibration, ReverseMode,
    SwitchConfig,
};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level fallback when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Build a simulated fleet instead of touching hardware.
    #[serde(default)]
    pub simulate: bool,

    /// One Maestro serial board and its channels.
    #[serde(default)]
    pub maestro: Option<MaestroCalibration>,

    /// GPIO-driven engines, one actuator each.
    #[serde(default)]
    pub gpio_engines: Vec<GpioEngineCalibration>,

    /// GPIO-driven steering servos, one actuator each.
    #[serde(default)]
    pub gpio_steering: Vec<GpioSteeringCalibration>,

    /// Auxiliary cooling relay.
    #[serde(default)]
    pub cooling: Option<SwitchConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            simulate: false,
            maestro: None,
            gpio_engines: Vec::new(),
            gpio_steering: Vec::new(),
            cooling: None,
        }
    }
}

/// Load and validate the configuration at `path`.
///
/// # Errors
///
/// Returns [`DriveError::Config`] when the file cannot be read or parsed,
/// or when validation rejects it.
pub fn load(path: &Path) -> Result<Config, DriveError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| DriveError::Config(format!("can't read {}: {e}", path.display())))?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| DriveError::Config(format!("can't parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject configurations that would build a broken fleet.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Config`] naming the first offending entry.
    pub fn validate(&self) -> Result<(), DriveError> {
        if let Some(maestro) = &self.maestro {
            if maestro.engines.is_empty() || maestro.steering.is_empty() {
                return Err(DriveError::Config(
                    "maestro needs at least one engine and one steering channel".to_string(),
                ));
            }
            for engine in &maestro.engines {
                if engine.step == 0 {
                    return Err(DriveError::Config(format!(
                        "maestro engine channel {} has a zero step",
                        engine.channel
                    )));
                }
            }
            for servo in &maestro.steering {
                if servo.step == 0 {
                    return Err(DriveError::Config(format!(
                        "maestro steering channel {} has a zero step",
                        servo.channel
                    )));
                }
            }
        }

        // Every GPIO line may be owned by exactly one actuator.
        let mut owned_lines = HashSet::new();
        let mut claim = |chip: &str, line: u32| -> Result<(), DriveError> {
            if !owned_lines.insert((chip.to_string(), line)) {
                return Err(DriveError::Config(format!(
                    "gpio line {chip}:{line} is configured twice"
                )));
            }
            Ok(())
        };

        for engine in &self.gpio_engines {
            let name = format!("gpio engine {}:{}", engine.chip, engine.line);
            if engine.pwm_period == 0 {
                return Err(DriveError::Config(format!("{name} has a zero pwm period")));
            }
            if engine.min_duty >= engine.max_duty || engine.max_duty > 100 {
                return Err(DriveError::Config(format!(
                    "{name} has an invalid duty range {}..{}",
                    engine.min_duty, engine.max_duty
                )));
            }
            if engine.pwm_device.is_none() {
                claim(&engine.chip, engine.line)?;
            }
            if engine.reverse_mode == ReverseMode::DedicatedLine {
                claim(&engine.chip, engine.direction_line)?;
            }
        }

        for steering in &self.gpio_steering {
            let name = format!("gpio steering {}:{}", steering.chip, steering.line);
            if steering.pwm_period == 0 {
                return Err(DriveError::Config(format!("{name} has a zero pwm period")));
            }
            if steering.min_duty >= steering.max_duty || steering.max_duty > 100 {
                return Err(DriveError::Config(format!(
                    "{name} has an invalid duty range {}..{}",
                    steering.min_duty, steering.max_duty
                )));
            }
            if steering.pwm_device.is_none() {
                claim(&steering.chip, steering.line)?;
            }
        }

        if let Some(cooling) = &self.cooling {
            claim(&cooling.chip, cooling.line)?;
        }

        if !self.simulate
            && self.maestro.is_none()
            && self.gpio_engines.is_empty()
            && self.gpio_steering.is_empty()
        {
            return Err(DriveError::Config("no actuators configured".to_string()));
        }

        Ok(())
    }

    /// Build the fleet this configuration describes. Individual actuators
    /// that fail to acquire their hardware come up not-sane and are
    /// reported through their own logging; the fleet is built regardless.
    pub fn build_fleet(&self) -> Fleet {
        let mut fleet = Fleet::new();

        if self.simulate {
            fleet.add_actuator(SimActuator::new("sim-engine"));
            fleet.add_actuator(SimActuator::new("sim-steering"));
            fleet.set_cooling(Box::new(SimSwitch::new("sim-cooling")));
            return fleet;
        }

        if let Some(maestro) = &self.maestro {
            fleet.add_actuator(Box::new(SerialMaestro::open(maestro)));
        }
        for calibration in &self.gpio_engines {
            fleet.add_actuator(Box::new(GpioEngineController::new(calibration.clone())));
        }
        for calibration in &self.gpio_steering {
            fleet.add_actuator(Box::new(GpioSteeringController::new(calibration.clone())));
        }
        if let Some(cooling) = &self.cooling {
            fleet.set_cooling(Box::new(GpioSwitch::new(cooling)));
        }

        fleet
    }
}
