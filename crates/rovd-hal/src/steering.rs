//! GPIO-driven steering servo.
//!
//! A single bidirectional line: the duty cycle swings around a neutral
//! value exactly like a same-line engine, but steering always supports both
//! directions. For extra resolution the calibration works in tenths of a
//! percent (see [`GpioSteeringCalibration`]).

use rovd_types::{DriveError, GpioSteeringCalibration, SpeedLevel, SteeringLevel};
use tracing::{debug, error};

use crate::actuator::Actuator;
use crate::pwm::{PulseGenerator, PwmOutput};
use crate::syspwm::SysfsPwm;

/// One steering servo driven over GPIO, software- or hardware-timed.
pub struct GpioSteeringController {
    name: String,
    calibration: GpioSteeringCalibration,
    /// `None` once any acquisition has failed.
    output: Option<PwmOutput>,
    steering: SteeringLevel,
}

impl GpioSteeringController {
    /// Build the controller and, in hardware-timing mode, export the pulse
    /// device. A failed export is logged and leaves the controller
    /// permanently not-sane.
    pub fn new(calibration: GpioSteeringCalibration) -> Self {
        let name = match &calibration.pwm_device {
            Some(device) => format!("steering {device}/pwm{}", calibration.pwm_channel),
            None => format!("steering {}:{}", calibration.chip, calibration.line),
        };

        let output = match &calibration.pwm_device {
            Some(device) => match SysfsPwm::export(device, calibration.pwm_channel) {
                Ok(pwm) => Some(PwmOutput::Hard(pwm)),
                Err(e) => {
                    error!(name = %name, error = %e, "pulse device unavailable");
                    None
                }
            },
            None => Some(PwmOutput::Soft(PulseGenerator::new(
                &calibration.chip,
                calibration.line,
                calibration.pwm_period,
            ))),
        };

        GpioSteeringController {
            name,
            calibration,
            output,
            steering: SteeringLevel::STRAIGHT,
        }
    }

    fn is_sane(&self) -> bool {
        self.output.is_some()
    }
}

impl Actuator for GpioSteeringController {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DriveError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        // Hardware timing comes up centred so the servo starts straight.
        let initial = self.calibration.neutral_pulse_width();
        if let Err(e) = output.arm(self.calibration.pwm_period, initial) {
            error!(name = %self.name, error = %e, "steering failed to arm");
            self.output = None;
            return Err(e);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.disarm();
        }
    }

    fn speed(&self) -> SpeedLevel {
        SpeedLevel::STOP
    }

    fn set_speed(&mut self, _speed: SpeedLevel) -> Result<(), DriveError> {
        // Steering servos have no propulsion axis.
        Ok(())
    }

    fn steering(&self) -> SteeringLevel {
        if self.is_sane() {
            self.steering
        } else {
            SteeringLevel::STRAIGHT
        }
    }

    fn set_steering(&mut self, steering: SteeringLevel) -> Result<(), DriveError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        let width = self.calibration.pulse_width(steering);
        output.set_width(width)?;
        self.steering = steering;
        debug!(name = %self.name, level = steering.value(), width, "steering updated");
        Ok(())
    }
}

impl Drop for GpioSteeringController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_chip() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tmp dir");
        fs::create_dir(dir.path().join("pwm0")).expect("channel dir");
        dir
    }

    fn read_attr(dir: &tempfile::TempDir, attr: &str) -> String {
        fs::read_to_string(dir.path().join("pwm0").join(attr)).expect("attr")
    }

    fn hardware_calibration(dir: &tempfile::TempDir) -> GpioSteeringCalibration {
        GpioSteeringCalibration {
            chip: "/dev/gpiochip0".to_string(),
            line: 0,
            pwm_device: Some(dir.path().display().to_string()),
            pwm_channel: 0,
            pwm_period: 20_000,
            min_duty: 10,
            max_duty: 20,
        }
    }

    #[test]
    fn hardware_start_programs_neutral_duty() {
        let chip = fake_chip();
        let mut steering = GpioSteeringController::new(hardware_calibration(&chip));
        assert!(steering.is_sane());

        steering.start().unwrap();

        assert_eq!(read_attr(&chip, "period"), "20000000");
        // Scaled neutral is 150 tenths → 150·20000/1000 = 3000 µs → ns.
        assert_eq!(read_attr(&chip, "duty_cycle"), "3000000");
        assert_eq!(read_attr(&chip, "enable"), "1");
    }

    #[test]
    fn set_steering_writes_scaled_duty() {
        let chip = fake_chip();
        let mut steering = GpioSteeringController::new(hardware_calibration(&chip));
        steering.start().unwrap();

        steering.set_steering(SteeringLevel::new(5).unwrap()).unwrap();
        // 150 + 5·(200-150)/10 = 175 tenths → 3500 µs.
        assert_eq!(read_attr(&chip, "duty_cycle"), "3500000");
        assert_eq!(steering.steering().value(), 5);

        steering.set_steering(SteeringLevel::FULL_LEFT).unwrap();
        assert_eq!(read_attr(&chip, "duty_cycle"), "2000000"); // floor
    }

    #[test]
    fn software_mode_updates_the_generator_duration() {
        let calibration = GpioSteeringCalibration {
            chip: "/dev/gpiochip0".to_string(),
            line: 22,
            pwm_device: None,
            pwm_channel: 0,
            pwm_period: 20_000,
            min_duty: 10,
            max_duty: 20,
        };
        let mut steering = GpioSteeringController::new(calibration);

        steering.set_steering(SteeringLevel::new(-5).unwrap()).unwrap();
        match &steering.output {
            Some(PwmOutput::Soft(generator)) => assert_eq!(generator.duration(), 2500),
            _ => panic!("expected a software pulse backend"),
        }
    }

    #[test]
    fn failed_export_leaves_steering_inert() {
        let dir = tempfile::tempdir().expect("tmp dir"); // no pwm0 inside
        let mut steering = GpioSteeringController::new(hardware_calibration(&dir));
        assert!(!steering.is_sane());

        steering.set_steering(SteeringLevel::FULL_RIGHT).unwrap();
        assert_eq!(steering.steering(), SteeringLevel::STRAIGHT);
    }

    #[test]
    fn steering_ignores_speed() {
        let chip = fake_chip();
        let mut steering = GpioSteeringController::new(hardware_calibration(&chip));
        steering.set_speed(SpeedLevel::FULL_FORWARD).unwrap();
        assert_eq!(steering.speed(), SpeedLevel::STOP);
    }
}
