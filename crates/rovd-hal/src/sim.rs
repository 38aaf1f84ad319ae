//! Simulated actuators for headless runs and tests.
//!
//! [`SimActuator`] and [`SimSwitch`] record every command they receive and
//! always succeed. The CLI builds a fleet of them when the configuration
//! sets `simulate = true`, so the whole stack can run without hardware;
//! the dispatcher tests assert against their recorded state.

use std::sync::{Arc, Mutex, MutexGuard};

use rovd_types::{DriveError, SpeedLevel, SteeringLevel};

use crate::actuator::Actuator;
use crate::switch::Switch;

/// Everything a [`SimActuator`] has observed.
#[derive(Debug, Default)]
pub struct SimState {
    pub speed: SpeedLevel,
    pub steering: SteeringLevel,
    pub started: bool,
    pub stopped: bool,
    /// Every speed command, in delivery order.
    pub speed_history: Vec<SpeedLevel>,
    /// Every steering command, in delivery order.
    pub steering_history: Vec<SteeringLevel>,
}

/// A simulated actuator that records the commands it receives. Always
/// succeeds.
pub struct SimActuator {
    name: String,
    state: Arc<Mutex<SimState>>,
}

impl SimActuator {
    /// Create a new simulated actuator with the given identifier.
    pub fn new(name: impl Into<String>) -> Box<Self> {
        Box::new(SimActuator {
            name: name.into(),
            state: Arc::new(Mutex::new(SimState::default())),
        })
    }

    /// Shared handle onto the recorded state, usable after the actuator has
    /// been boxed into a fleet.
    pub fn state(&self) -> Arc<Mutex<SimState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Actuator for SimActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), DriveError> {
        self.lock().started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().stopped = true;
    }

    fn speed(&self) -> SpeedLevel {
        self.lock().speed
    }

    fn set_speed(&mut self, speed: SpeedLevel) -> Result<(), DriveError> {
        let mut state = self.lock();
        state.speed = speed;
        state.speed_history.push(speed);
        Ok(())
    }

    fn steering(&self) -> SteeringLevel {
        self.lock().steering
    }

    fn set_steering(&mut self, steering: SteeringLevel) -> Result<(), DriveError> {
        let mut state = self.lock();
        state.steering = steering;
        state.steering_history.push(steering);
        Ok(())
    }
}

/// A simulated switch that records its state transitions. Always ready.
pub struct SimSwitch {
    name: String,
    state: Arc<Mutex<Vec<bool>>>,
}

impl SimSwitch {
    /// Create a new simulated switch with the given identifier.
    pub fn new(name: impl Into<String>) -> Self {
        SimSwitch {
            name: name.into(),
            state: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle onto the recorded transitions.
    pub fn transitions(&self) -> Arc<Mutex<Vec<bool>>> {
        Arc::clone(&self.state)
    }

    fn push(&self, on: bool) {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(on);
    }
}

impl Switch for SimSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn on(&mut self) {
        self.push(true);
    }

    fn off(&mut self) {
        self.push(false);
    }

    fn is_ready(&self) -> bool {
        true
    }
}
