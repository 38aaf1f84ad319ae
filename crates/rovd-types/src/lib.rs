//! `rovd-types` – shared vocabulary of the rovd stack.
//!
//! Everything the drive daemon's crates exchange lives here: the discrete
//! speed/steering levels, the command vocabulary, the per-actuator
//! calibration records, and the common error type.
//!
//! # Modules
//!
//! - [`level`] – [`SpeedLevel`][level::SpeedLevel] and
//!   [`SteeringLevel`][level::SteeringLevel]: signed levels in [-10, 10]
//!   with saturating steps and the `stop`/`fwdNN`/`revNN`,
//!   `straight`/`rightNN`/`leftNN` name vocabulary.
//! - [`command`] – [`Command`][command::Command]: the discrete commands the
//!   fleet dispatcher accepts.
//! - [`calib`] – calibration records mapping a level onto a physical value
//!   for each backend kind (serial target units, GPIO duty-cycle percent).

use thiserror::Error;

pub mod calib;
pub mod command;
pub mod level;

pub use calib::{
    EngineCalibration, GpioEngineCalibration, GpioSteeringCalibration, MaestroCalibration,
    ReverseMode, SteeringCalibration, SwitchConfig,
};
pub use command::Command;
pub use level::{SpeedLevel, SteeringLevel};

/// Error type spanning hardware faults, level/command parsing, and
/// configuration validation.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A hardware resource could not be acquired or driven.
    #[error("hardware fault on {component}: {details}")]
    Hardware { component: String, details: String },

    /// A raw level value outside [-10, 10].
    #[error("level {0} is outside [-10, 10]")]
    LevelRange(i8),

    /// A level name outside the validated vocabulary.
    #[error("unknown level name `{0}`")]
    LevelName(String),

    /// A command string that does not parse.
    #[error("unknown command `{0}`")]
    Command(String),

    /// Invalid configuration, rejected before any actuator is built.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    /// Shorthand for a [`DriveError::Hardware`] fault.
    pub fn hardware(component: impl Into<String>, details: impl ToString) -> Self {
        DriveError::Hardware {
            component: component.into(),
            details: details.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_error_display_names_component() {
        let err = DriveError::hardware("engine0", "line busy");
        assert_eq!(err.to_string(), "hardware fault on engine0: line busy");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let err: DriveError = io.into();
        assert!(matches!(err, DriveError::Io(_)));
    }
}
