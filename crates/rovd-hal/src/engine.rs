//! GPIO-driven propulsion engine.
//!
//! One engine, one PWM signal — timed either by a software
//! [`PulseGenerator`] thread or by a kernel pulse device
//! ([`SysfsPwm`]), selected by the calibration.
//!
//! Reverse handling follows the calibration's
//! [`ReverseMode`][rovd_types::ReverseMode]. `SameLine` centres the duty
//! cycle around a neutral value so one line carries both direction and
//! magnitude. `DedicatedLine` combines a binary direction write with the
//! magnitude-only duty calculation of `NoReverse`; that combination is one
//! deliberate code path, not two independent branches.

use rovd_types::{DriveError, GpioEngineCalibration, ReverseMode, SpeedLevel, SteeringLevel};
use tracing::{debug, error};

use crate::actuator::Actuator;
use crate::gpio::{self, GpioOut};
use crate::pwm::{PulseGenerator, PwmOutput};
use crate::syspwm::SysfsPwm;

/// One engine driven over GPIO.
///
/// A failed resource acquisition (pulse device export, direction line, or
/// the pulse line at [`start`][Actuator::start]) is logged and leaves the
/// controller permanently not-sane: every later command is a no-op and the
/// getters report neutral.
pub struct GpioEngineController {
    name: String,
    calibration: GpioEngineCalibration,
    /// `None` once any acquisition has failed.
    output: Option<PwmOutput>,
    direction: Option<Box<dyn GpioOut>>,
    speed: SpeedLevel,
}

impl GpioEngineController {
    /// Build the controller and acquire its construction-time resources
    /// (pulse-device export, direction line). The software pulse line
    /// itself is acquired on [`start`][Actuator::start].
    pub fn new(calibration: GpioEngineCalibration) -> Self {
        let name = match &calibration.pwm_device {
            Some(device) => format!("engine {device}/pwm{}", calibration.pwm_channel),
            None => format!("engine {}:{}", calibration.chip, calibration.line),
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

        let mut controller = GpioEngineController {
            name,
            calibration,
            output,
            direction: None,
            speed: SpeedLevel::STOP,
        };

        if controller.calibration.reverse_mode == ReverseMode::DedicatedLine
            && controller.output.is_some()
        {
            match gpio::open_output(
                &controller.calibration.chip,
                controller.calibration.direction_line,
                "rovd-direction",
            ) {
                Ok(line) => controller.direction = Some(Box::new(line)),
                Err(e) => {
                    error!(name = %controller.name, error = %e, "direction line unavailable");
                    controller.output = None;
                }
            }
        }

        controller
    }

    fn is_sane(&self) -> bool {
        self.output.is_some()
    }
}

impl Actuator for GpioEngineController {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DriveError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        // Hardware timing comes up armed at the minimum duty cycle; the
        // software generator keeps its line low until a speed is commanded.
        let initial = self.calibration.min_pulse_width();
        if let Err(e) = output.arm(self.calibration.pwm_period, initial) {
            error!(name = %self.name, error = %e, "engine failed to arm");
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
        if self.is_sane() {
            self.speed
        } else {
            SpeedLevel::STOP
        }
    }

    fn set_speed(&mut self, speed: SpeedLevel) -> Result<(), DriveError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };
        // Direction first; left unchanged at neutral.
        if let (Some(level), Some(direction)) = (
            self.calibration.direction_level(speed),
            self.direction.as_mut(),
        ) {
            direction.set(level)?;
        }
        let width = self.calibration.pulse_width(speed);
        output.set_width(width)?;
        self.speed = speed;
        debug!(name = %self.name, level = speed.value(), width, "engine speed updated");
        Ok(())
    }

    fn steering(&self) -> SteeringLevel {
        SteeringLevel::STRAIGHT
    }

    fn set_steering(&mut self, _steering: SteeringLevel) -> Result<(), DriveError> {
        // Engines have no steering axis.
        Ok(())
    }
}

impl Drop for GpioEngineController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    struct RecordingLine {
        writes: Arc<Mutex<Vec<bool>>>,
    }

    impl GpioOut for RecordingLine {
        fn set(&mut self, high: bool) -> Result<(), DriveError> {
            self.writes.lock().unwrap().push(high);
            Ok(())
        }
    }

    fn fake_chip() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tmp dir");
        fs::create_dir(dir.path().join("pwm0")).expect("channel dir");
        dir
    }

    fn read_attr(dir: &tempfile::TempDir, attr: &str) -> String {
        fs::read_to_string(dir.path().join("pwm0").join(attr)).expect("attr")
    }

    fn hardware_calibration(dir: &tempfile::TempDir, mode: ReverseMode) -> GpioEngineCalibration {
        GpioEngineCalibration {
            chip: "/dev/gpiochip0".to_string(),
            line: 0,
            pwm_device: Some(dir.path().display().to_string()),
            pwm_channel: 0,
            direction_line: 27,
            pwm_period: 100,
            min_duty: 10,
            max_duty: 90,
            reverse_mode: mode,
            forward: true,
            direction_forward_level: 1,
            direction_reverse_level: 0,
        }
    }

    #[test]
    fn hardware_start_programs_period_and_minimum_duty() {
        let chip = fake_chip();
        let mut engine =
            GpioEngineController::new(hardware_calibration(&chip, ReverseMode::SameLine));
        assert!(engine.is_sane());

        engine.start().unwrap();

        assert_eq!(read_attr(&chip, "period"), "100000"); // 100 µs in ns
        assert_eq!(read_attr(&chip, "duty_cycle"), "10000"); // 10 % of 100 µs
        assert_eq!(read_attr(&chip, "enable"), "1");
    }

    #[test]
    fn same_line_speed_writes_centred_duty() {
        let chip = fake_chip();
        let mut engine =
            GpioEngineController::new(hardware_calibration(&chip, ReverseMode::SameLine));
        engine.start().unwrap();

        engine.set_speed(SpeedLevel::new(5).unwrap()).unwrap();
        assert_eq!(read_attr(&chip, "duty_cycle"), "70000"); // 70 µs

        engine.set_speed(SpeedLevel::FULL_REVERSE).unwrap();
        assert_eq!(read_attr(&chip, "duty_cycle"), "10000"); // clamped floor
    }

    #[test]
    fn stop_disables_the_hardware_channel() {
        let chip = fake_chip();
        let mut engine =
            GpioEngineController::new(hardware_calibration(&chip, ReverseMode::NoReverse));
        engine.start().unwrap();

        engine.stop();
        assert_eq!(read_attr(&chip, "enable"), "0");
    }

    #[test]
    fn dedicated_line_combines_direction_and_magnitude() {
        let chip = fake_chip();
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut engine =
            GpioEngineController::new(hardware_calibration(&chip, ReverseMode::DedicatedLine));
        // No gpiochip in the test environment; inject the direction fake and
        // restore sanity by hand.
        engine.output = Some(PwmOutput::Hard(
            SysfsPwm::export(chip.path(), 0).expect("export"),
        ));
        engine.direction = Some(Box::new(RecordingLine {
            writes: Arc::clone(&writes),
        }));
        engine.start().unwrap();

        engine.set_speed(SpeedLevel::new(4).unwrap()).unwrap();
        // Magnitude only on the PWM line: 10 + 4·(90-10)/10 = 42 %.
        assert_eq!(read_attr(&chip, "duty_cycle"), "42000");
        assert_eq!(*writes.lock().unwrap(), vec![true]);

        engine.set_speed(SpeedLevel::new(-4).unwrap()).unwrap();
        // Same magnitude, opposite direction level.
        assert_eq!(read_attr(&chip, "duty_cycle"), "42000");
        assert_eq!(*writes.lock().unwrap(), vec![true, false]);

        // Neutral drives the duty floor but leaves the direction line alone.
        engine.set_speed(SpeedLevel::STOP).unwrap();
        assert_eq!(read_attr(&chip, "duty_cycle"), "10000");
        assert_eq!(*writes.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn software_mode_updates_the_generator_duration() {
        let calibration = GpioEngineCalibration {
            chip: "/dev/gpiochip0".to_string(),
            line: 17,
            pwm_device: None,
            pwm_channel: 0,
            direction_line: 0,
            pwm_period: 100,
            min_duty: 10,
            max_duty: 90,
            reverse_mode: ReverseMode::SameLine,
            forward: true,
            direction_forward_level: 1,
            direction_reverse_level: 0,
        };
        let mut engine = GpioEngineController::new(calibration);
        assert!(engine.is_sane());

        // Without starting (no gpiochip here), the commanded duration is
        // still observable on the generator.
        engine.set_speed(SpeedLevel::new(5).unwrap()).unwrap();
        match &engine.output {
            Some(PwmOutput::Soft(generator)) => assert_eq!(generator.duration(), 70),
            _ => panic!("expected a software pulse backend"),
        }
    }

    #[test]
    fn failed_export_leaves_the_engine_inert() {
        let dir = tempfile::tempdir().expect("tmp dir"); // no pwm0 inside
        let calibration = hardware_calibration(&dir, ReverseMode::SameLine);

        let mut engine = GpioEngineController::new(calibration);
        assert!(!engine.is_sane());

        engine.set_speed(SpeedLevel::FULL_FORWARD).unwrap();
        assert_eq!(engine.speed(), SpeedLevel::STOP);
        assert!(engine.start().is_ok());
        engine.stop();
    }

    #[test]
    fn engines_ignore_steering() {
        let chip = fake_chip();
        let mut engine =
            GpioEngineController::new(hardware_calibration(&chip, ReverseMode::NoReverse));
        engine.set_steering(SteeringLevel::FULL_RIGHT).unwrap();
        assert_eq!(engine.steering(), SteeringLevel::STRAIGHT);
    }
}
