//! The discrete command vocabulary the fleet dispatcher accepts.

use std::str::FromStr;

use crate::DriveError;
use crate::level::{SpeedLevel, SteeringLevel};

/// One logical drive command.
///
/// Relative commands move the current level one step with saturation at the
/// extremes; absolute commands carry a validated level resolved from its
/// name (see [`SpeedLevel`]/[`SteeringLevel`] `FromStr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SpeedUp,
    SpeedDown,
    TurnLeft,
    TurnRight,
    SetSpeed(SpeedLevel),
    SetSteering(SteeringLevel),
}

impl FromStr for Command {
    type Err = DriveError;

    /// Parse the wire spelling: `speed_up`, `speed_down`, `turn_left`,
    /// `turn_right`, `set_speed <name>`, `set_steering <name>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let cmd = match (parts.next(), parts.next(), parts.next()) {
            (Some("speed_up"), None, None) => Command::SpeedUp,
            (Some("speed_down"), None, None) => Command::SpeedDown,
            (Some("turn_left"), None, None) => Command::TurnLeft,
            (Some("turn_right"), None, None) => Command::TurnRight,
            (Some("set_speed"), Some(name), None) => Command::SetSpeed(name.parse()?),
            (Some("set_steering"), Some(name), None) => Command::SetSteering(name.parse()?),
            _ => return Err(DriveError::Command(s.to_string())),
        };
        Ok(cmd)
    }
}
