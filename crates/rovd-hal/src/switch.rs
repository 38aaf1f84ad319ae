//! Auxiliary on/off output (the cooling relay).

use rovd_types::SwitchConfig;
use tracing::{debug, error, warn};

use crate::gpio::{self, GpioOut};

/// A discrete on/off output device.
///
/// The fleet dispatcher drives one of these alongside speed changes. A
/// switch that failed to initialise stays permanently inert — `on`/`off`
/// become no-ops — which callers can detect via
/// [`is_ready`][Self::is_ready].
pub trait Switch: Send {
    /// Stable identifier for log lines.
    fn name(&self) -> &str;

    /// Energise the output.
    fn on(&mut self);

    /// De-energise the output.
    fn off(&mut self);

    /// Whether the output was successfully acquired.
    fn is_ready(&self) -> bool;
}

/// A switch backed by one GPIO output line.
pub struct GpioSwitch {
    name: String,
    line: Option<Box<dyn GpioOut>>,
}

impl GpioSwitch {
    /// Acquire the configured line. On failure the switch is created inert
    /// and the error is logged once here.
    pub fn new(config: &SwitchConfig) -> Self {
        let name = format!("switch {}:{}", config.chip, config.line);
        let line = match gpio::open_output(&config.chip, config.line, "rovd-switch") {
            Ok(line) => Some(Box::new(line) as Box<dyn GpioOut>),
            Err(e) => {
                error!(name = %name, error = %e, "switch initialization failed");
                None
            }
        };
        GpioSwitch { name, line }
    }

    fn set(&mut self, high: bool) {
        if let Some(line) = self.line.as_mut()
            && let Err(e) = line.set(high)
        {
            // Transient write failure: the command is dropped, the switch
            // stays usable.
            warn!(name = %self.name, error = %e, "switch write failed");
        }
    }
}

impl Switch for GpioSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn on(&mut self) {
        debug!(name = %self.name, "switch on");
        self.set(true);
    }

    fn off(&mut self) {
        debug!(name = %self.name, "switch off");
        self.set(false);
    }

    fn is_ready(&self) -> bool {
        self.line.is_some()
    }
}
