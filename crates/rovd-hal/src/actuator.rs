//! Generic `Actuator` trait for everything the fleet dispatcher drives.
//!
//! Backends implement this trait and are handed to the
//! [`Fleet`][crate::fleet::Fleet] as boxed trait objects, so the dispatcher
//! never knows whether a command lands on a serial board, a GPIO line, or a
//! simulation stub.

use rovd_types::{DriveError, SpeedLevel, SteeringLevel};

/// One running actuator backend.
///
/// All backends are open-loop: the getters report the most recently
/// *commanded* level, not a measured one. An actuator whose hardware
/// resource could not be acquired is "not sane": it ignores every command
/// and its getters return the neutral levels.
pub trait Actuator: Send {
    /// Stable identifier for log lines, e.g. `"engine /dev/gpiochip0:17"`.
    fn name(&self) -> &str;

    /// Arm the backend (spawn the pulse thread, enable the output).
    ///
    /// # Errors
    ///
    /// Returns [`DriveError`] when the hardware cannot be armed; the
    /// actuator is then permanently inert.
    fn start(&mut self) -> Result<(), DriveError>;

    /// Disarm the backend. Infallible; teardown failures are only logged.
    fn stop(&mut self);

    /// Currently commanded speed, [`SpeedLevel::STOP`] when not sane.
    fn speed(&self) -> SpeedLevel;

    /// Command a new speed. Not-sane actuators ignore this silently.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError`] on a transient I/O failure; the command is
    /// dropped but the actuator stays usable.
    fn set_speed(&mut self, speed: SpeedLevel) -> Result<(), DriveError>;

    /// Currently commanded steering, [`SteeringLevel::STRAIGHT`] when not
    /// sane or when the backend has no steering axis.
    fn steering(&self) -> SteeringLevel;

    /// Command a new steering position. Backends without a steering axis
    /// (propulsion engines) treat this as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError`] on a transient I/O failure.
    fn set_steering(&mut self, steering: SteeringLevel) -> Result<(), DriveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process actuator used only for this contract test.
    struct MockActuator {
        name: String,
        speed: SpeedLevel,
        steering: SteeringLevel,
    }

    impl Actuator for MockActuator {
        fn name(&self) -> &str {
            &self.name
        }

        fn start(&mut self) -> Result<(), DriveError> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn speed(&self) -> SpeedLevel {
            self.speed
        }

        fn set_speed(&mut self, speed: SpeedLevel) -> Result<(), DriveError> {
            self.speed = speed;
            Ok(())
        }

        fn steering(&self) -> SteeringLevel {
            self.steering
        }

        fn set_steering(&mut self, steering: SteeringLevel) -> Result<(), DriveError> {
            self.steering = steering;
            Ok(())
        }
    }

    #[test]
    fn mock_actuator_round_trips_levels() {
        let mut actuator = MockActuator {
            name: "test".to_string(),
            speed: SpeedLevel::STOP,
            steering: SteeringLevel::STRAIGHT,
        };
        assert_eq!(actuator.name(), "test");

        let ahead = SpeedLevel::new(3).unwrap();
        actuator.set_speed(ahead).unwrap();
        assert_eq!(actuator.speed(), ahead);

        let port = SteeringLevel::new(-7).unwrap();
        actuator.set_steering(port).unwrap();
        assert_eq!(actuator.steering(), port);
    }
}
