//! Discrete speed and steering levels.
//!
//! A level is a plain signed integer in [-10, 10] — one step per 10 % of the
//! actuator's range, 0 = neutral. The newtypes below only guarantee the
//! range invariant and provide the saturating step operations the dispatcher
//! uses; all calibration arithmetic works on the raw value.
//!
//! The textual vocabulary (`stop`, `fwd10`..`fwd100`, `rev10`..`rev100` and
//! `straight`, `right10`..`right100`, `left10`..`left100`) is implemented via
//! [`FromStr`]/[`Display`], so a validated name and a level convert both ways.

use std::fmt;
use std::str::FromStr;

use crate::DriveError;

/// Commanded speed: 0 = stopped, positive = forward, negative = reverse,
/// magnitude = tens of percent of maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeedLevel(i8);

impl SpeedLevel {
    /// Engines stopped.
    pub const STOP: SpeedLevel = SpeedLevel(0);
    /// Full ahead (`fwd100`).
    pub const FULL_FORWARD: SpeedLevel = SpeedLevel(10);
    /// Full astern (`rev100`).
    pub const FULL_REVERSE: SpeedLevel = SpeedLevel(-10);

    /// Build a level from a raw value, rejecting anything outside [-10, 10].
    pub fn new(value: i8) -> Result<Self, DriveError> {
        if (-10..=10).contains(&value) {
            Ok(SpeedLevel(value))
        } else {
            Err(DriveError::LevelRange(value))
        }
    }

    /// Raw level value.
    pub const fn value(self) -> i8 {
        self.0
    }

    pub const fn is_stopped(self) -> bool {
        self.0 == 0
    }

    /// One step faster, saturating at full forward.
    #[must_use]
    pub fn faster(self) -> SpeedLevel {
        SpeedLevel((self.0 + 1).min(10))
    }

    /// One step slower, saturating at full reverse.
    #[must_use]
    pub fn slower(self) -> SpeedLevel {
        SpeedLevel((self.0 - 1).max(-10))
    }
}

impl Default for SpeedLevel {
    fn default() -> Self {
        SpeedLevel::STOP
    }
}

impl fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("stop"),
            n if n > 0 => write!(f, "fwd{}", i32::from(n) * 10),
            n => write!(f, "rev{}", i32::from(-n) * 10),
        }
    }
}

impl FromStr for SpeedLevel {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "stop" {
            return Ok(SpeedLevel::STOP);
        }
        let parsed = if let Some(pct) = s.strip_prefix("fwd") {
            parse_percent(pct)
        } else if let Some(pct) = s.strip_prefix("rev") {
            parse_percent(pct).map(|l| -l)
        } else {
            None
        };
        parsed
            .map(SpeedLevel)
            .ok_or_else(|| DriveError::LevelName(s.to_string()))
    }
}

/// Commanded steering angle: 0 = straight, positive = right, negative = left,
/// magnitude = tens of percent of maximum deflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SteeringLevel(i8);

impl SteeringLevel {
    /// Rudder centred.
    pub const STRAIGHT: SteeringLevel = SteeringLevel(0);
    /// Hard right (`right100`).
    pub const FULL_RIGHT: SteeringLevel = SteeringLevel(10);
    /// Hard left (`left100`).
    pub const FULL_LEFT: SteeringLevel = SteeringLevel(-10);

    /// Build a level from a raw value, rejecting anything outside [-10, 10].
    pub fn new(value: i8) -> Result<Self, DriveError> {
        if (-10..=10).contains(&value) {
            Ok(SteeringLevel(value))
        } else {
            Err(DriveError::LevelRange(value))
        }
    }

    /// Raw level value.
    pub const fn value(self) -> i8 {
        self.0
    }

    pub const fn is_straight(self) -> bool {
        self.0 == 0
    }

    /// One step to the right, saturating at full right.
    #[must_use]
    pub fn right(self) -> SteeringLevel {
        SteeringLevel((self.0 + 1).min(10))
    }

    /// One step to the left, saturating at full left.
    #[must_use]
    pub fn left(self) -> SteeringLevel {
        SteeringLevel((self.0 - 1).max(-10))
    }
}

impl Default for SteeringLevel {
    fn default() -> Self {
        SteeringLevel::STRAIGHT
    }
}

impl fmt::Display for SteeringLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("straight"),
            n if n > 0 => write!(f, "right{}", i32::from(n) * 10),
            n => write!(f, "left{}", i32::from(-n) * 10),
        }
    }
}

impl FromStr for SteeringLevel {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "straight" {
            return Ok(SteeringLevel::STRAIGHT);
        }
        let parsed = if let Some(pct) = s.strip_prefix("right") {
            parse_percent(pct)
        } else if let Some(pct) = s.strip_prefix("left") {
            parse_percent(pct).map(|l| -l)
        } else {
            None
        };
        parsed
            .map(SteeringLevel)
            .ok_or_else(|| DriveError::LevelName(s.to_string()))
    }
}

/// Parse the `10`..`100` percent suffix of a level name into a level
/// magnitude in [1, 10]. `0` and non-multiples of ten are not part of the
/// vocabulary.
fn parse_percent(s: &str) -> Option<i8> {
    let pct: u16 = s.parse().ok()?;
    if pct == 0 || pct > 100 || pct % 10 != 0 {
        return None;
    }
    Some((pct / 10) as i8)
}
