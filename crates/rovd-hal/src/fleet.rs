//! Fleet dispatcher: one logical command fanned out to every actuator.
//!
//! The [`Fleet`] holds the single authoritative speed and steering level —
//! backends are open-loop and are never queried back — plus an ordered list
//! of actuator instances addressed only through the [`Actuator`] contract.
//! Every change pushes the new level to every actuator in list order; a
//! failing actuator is logged and skipped, never retried, and never blocks
//! delivery to the rest.

use rovd_types::{Command, SpeedLevel, SteeringLevel};
use tracing::{error, info, warn};

use crate::actuator::Actuator;
use crate::switch::Switch;

/// The set of actuator instances driven in lockstep, plus the auxiliary
/// cooling relay energised whenever the commanded speed leaves neutral.
#[derive(Default)]
pub struct Fleet {
    speed: SpeedLevel,
    steering: SteeringLevel,
    actuators: Vec<Box<dyn Actuator>>,
    cooling: Option<Box<dyn Switch>>,
}

impl Fleet {
    /// Create an empty fleet at neutral.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an actuator; commands are delivered in insertion order.
    pub fn add_actuator(&mut self, actuator: Box<dyn Actuator>) {
        self.actuators.push(actuator);
    }

    /// Attach the cooling relay driven alongside speed changes.
    pub fn set_cooling(&mut self, cooling: Box<dyn Switch>) {
        self.cooling = Some(cooling);
    }

    /// Number of actuators in the fleet.
    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    /// The authoritative commanded speed.
    pub fn speed(&self) -> SpeedLevel {
        self.speed
    }

    /// The authoritative commanded steering.
    pub fn steering(&self) -> SteeringLevel {
        self.steering
    }

    /// Arm every actuator. A failure disables only that actuator; the rest
    /// of the fleet still starts.
    pub fn start(&mut self) {
        for actuator in &mut self.actuators {
            if let Err(e) = actuator.start() {
                error!(actuator = actuator.name(), error = %e, "failed to start");
            }
        }
    }

    /// Drive the fleet to neutral, then disarm every actuator. Shutdown
    /// order matters: sane actuators must see stop/straight before their
    /// outputs are released.
    pub fn stop(&mut self) {
        self.set_speed(SpeedLevel::STOP);
        self.set_steering(SteeringLevel::STRAIGHT);
        for actuator in &mut self.actuators {
            actuator.stop();
        }
    }

    /// Apply one logical command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SpeedUp => self.speed_up(),
            Command::SpeedDown => self.speed_down(),
            Command::TurnLeft => self.turn_left(),
            Command::TurnRight => self.turn_right(),
            Command::SetSpeed(speed) => self.set_speed(speed),
            Command::SetSteering(steering) => self.set_steering(steering),
        }
    }

    /// One step faster; saturated requests are silently absorbed.
    pub fn speed_up(&mut self) {
        self.change_speed(self.speed.faster());
    }

    /// One step slower; saturated requests are silently absorbed.
    pub fn speed_down(&mut self) {
        self.change_speed(self.speed.slower());
    }

    /// One step right; saturated requests are silently absorbed.
    pub fn turn_right(&mut self) {
        self.change_steering(self.steering.right());
    }

    /// One step left; saturated requests are silently absorbed.
    pub fn turn_left(&mut self) {
        self.change_steering(self.steering.left());
    }

    /// Absolute speed set.
    pub fn set_speed(&mut self, speed: SpeedLevel) {
        self.change_speed(speed);
    }

    /// Absolute steering set.
    pub fn set_steering(&mut self, steering: SteeringLevel) {
        self.change_steering(steering);
    }

    fn change_speed(&mut self, new: SpeedLevel) {
        if new == self.speed {
            return;
        }
        self.speed = new;
        info!(level = %new, "speed change");

        // The relay reflects the new level before the engines see it.
        if let Some(cooling) = self.cooling.as_mut() {
            if new.is_stopped() {
                cooling.off();
            } else {
                cooling.on();
            }
        }

        for actuator in &mut self.actuators {
            if let Err(e) = actuator.set_speed(new) {
                warn!(actuator = actuator.name(), error = %e, "speed command dropped");
            }
        }
    }

    fn change_steering(&mut self, new: SteeringLevel) {
        if new == self.steering {
            return;
        }
        self.steering = new;
        info!(level = %new, "steering change");

        for actuator in &mut self.actuators {
            if let Err(e) = actuator.set_steering(new) {
                warn!(actuator = actuator.name(), error = %e, "steering command dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimActuator, SimSwitch};
    use rovd_types::DriveError;
    use std::sync::{Arc, Mutex};

    use crate::sim::SimState;

    /// An actuator whose commands always fail, for isolation tests.
    struct FailingActuator;

    impl Actuator for FailingActuator {
        fn name(&self) -> &str {
            "failing"
        }
        fn start(&mut self) -> Result<(), DriveError> {
            Err(DriveError::hardware("failing", "no line"))
        }
        fn stop(&mut self) {}
        fn speed(&self) -> SpeedLevel {
            SpeedLevel::STOP
        }
        fn set_speed(&mut self, _speed: SpeedLevel) -> Result<(), DriveError> {
            Err(DriveError::hardware("failing", "write error"))
        }
        fn steering(&self) -> SteeringLevel {
            SteeringLevel::STRAIGHT
        }
        fn set_steering(&mut self, _steering: SteeringLevel) -> Result<(), DriveError> {
            Err(DriveError::hardware("failing", "write error"))
        }
    }

    fn fleet_with_one_sim() -> (Fleet, Arc<Mutex<SimState>>) {
        let actuator = SimActuator::new("sim");
        let state = actuator.state();
        let mut fleet = Fleet::new();
        fleet.add_actuator(actuator);
        (fleet, state)
    }

    #[test]
    fn turn_right_saturates_at_full_right() {
        let (mut fleet, state) = fleet_with_one_sim();
        fleet.set_steering("right90".parse().unwrap());
        fleet.turn_right();
        assert_eq!(fleet.steering(), SteeringLevel::FULL_RIGHT);

        let deliveries = state.lock().unwrap().steering_history.len();
        fleet.turn_right(); // beyond the extreme: a complete no-op
        assert_eq!(fleet.steering(), SteeringLevel::FULL_RIGHT);
        assert_eq!(state.lock().unwrap().steering_history.len(), deliveries);
    }

    #[test]
    fn speed_down_saturates_at_full_reverse() {
        let (mut fleet, state) = fleet_with_one_sim();
        fleet.set_speed("rev90".parse().unwrap());
        fleet.speed_down();
        assert_eq!(fleet.speed(), SpeedLevel::FULL_REVERSE);

        let deliveries = state.lock().unwrap().speed_history.len();
        fleet.speed_down();
        assert_eq!(fleet.speed(), SpeedLevel::FULL_REVERSE);
        assert_eq!(state.lock().unwrap().speed_history.len(), deliveries);
    }

    #[test]
    fn relative_steps_walk_the_ladder() {
        let (mut fleet, _state) = fleet_with_one_sim();
        fleet.speed_up();
        assert_eq!(fleet.speed().to_string(), "fwd10");
        fleet.speed_down();
        fleet.speed_down();
        assert_eq!(fleet.speed().to_string(), "rev10");
        fleet.turn_left();
        assert_eq!(fleet.steering().to_string(), "left10");
        fleet.turn_right();
        assert_eq!(fleet.steering(), SteeringLevel::STRAIGHT);
    }

    #[test]
    fn speed_changes_drive_the_cooling_relay() {
        let (mut fleet, _state) = fleet_with_one_sim();
        let cooling = SimSwitch::new("cooling");
        let transitions = cooling.transitions();
        fleet.set_cooling(Box::new(cooling));

        fleet.set_speed("fwd10".parse().unwrap());
        assert_eq!(*transitions.lock().unwrap(), vec![true]);

        fleet.set_speed("rev20".parse().unwrap());
        assert_eq!(*transitions.lock().unwrap(), vec![true, true]);

        fleet.set_speed(SpeedLevel::STOP);
        assert_eq!(*transitions.lock().unwrap(), vec![true, true, false]);

        // Steering never touches the relay.
        fleet.turn_left();
        assert_eq!(transitions.lock().unwrap().len(), 3);
    }

    #[test]
    fn one_failing_actuator_does_not_block_the_rest() {
        let healthy = SimActuator::new("healthy");
        let state = healthy.state();
        let mut fleet = Fleet::new();
        fleet.add_actuator(Box::new(FailingActuator));
        fleet.add_actuator(healthy);

        fleet.start();
        fleet.set_speed("fwd30".parse().unwrap());
        fleet.set_steering("left40".parse().unwrap());

        let state = state.lock().unwrap();
        assert!(state.started);
        assert_eq!(state.speed.to_string(), "fwd30");
        assert_eq!(state.steering.to_string(), "left40");
    }

    #[test]
    fn stop_drives_neutral_before_disarming() {
        let (mut fleet, state) = fleet_with_one_sim();
        fleet.set_speed("fwd50".parse().unwrap());
        fleet.set_steering("right30".parse().unwrap());

        fleet.stop();

        let state = state.lock().unwrap();
        assert_eq!(state.speed, SpeedLevel::STOP);
        assert_eq!(state.steering, SteeringLevel::STRAIGHT);
        assert!(state.stopped);
        assert_eq!(fleet.speed(), SpeedLevel::STOP);
    }

    #[test]
    fn apply_maps_the_command_vocabulary() {
        let (mut fleet, _state) = fleet_with_one_sim();
        fleet.apply(Command::SpeedUp);
        fleet.apply(Command::SpeedUp);
        fleet.apply(Command::TurnRight);
        fleet.apply("set_speed rev40".parse().unwrap());
        fleet.apply("set_steering left100".parse().unwrap());

        assert_eq!(fleet.speed().to_string(), "rev40");
        assert_eq!(fleet.steering(), SteeringLevel::FULL_LEFT);
    }

    #[test]
    fn redundant_absolute_set_is_a_noop() {
        let (mut fleet, state) = fleet_with_one_sim();
        fleet.set_speed("fwd20".parse().unwrap());
        fleet.set_speed("fwd20".parse().unwrap());
        assert_eq!(state.lock().unwrap().speed_history.len(), 1);
    }
}
