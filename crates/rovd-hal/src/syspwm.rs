//! Kernel pulse-generator (sysfs PWM) channel.
//!
//! The kernel exposes hardware PWM as a directory of attribute files below
//! e.g. `/sys/class/pwm/pwmchip0`: writing a channel index to `export`
//! materialises `pwmN/`, whose `period` and `duty_cycle` files take
//! nanoseconds and whose `enable` file takes `"1"`/`"0"`. All widths on
//! this API are microseconds and are scaled on the way out.
//!
//! The base path is plain data, so tests point a channel at a tempdir.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rovd_types::DriveError;
use tracing::debug;

/// One exported channel of a sysfs PWM chip.
pub struct SysfsPwm {
    channel_dir: PathBuf,
    component: String,
}

impl SysfsPwm {
    /// Export `channel` below `base` and return a handle to it.
    ///
    /// Exporting an already exported channel fails in the kernel, so the
    /// export write itself is advisory; only the channel directory failing
    /// to appear is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Hardware`] when the channel directory does not
    /// exist after the export write — the actuator owning the channel then
    /// stays not-sane.
    pub fn export(base: impl AsRef<Path>, channel: u32) -> Result<Self, DriveError> {
        let base = base.as_ref();
        let component = format!("{}/pwm{channel}", base.display());
        if let Err(e) = write_attr(&base.join("export"), &channel.to_string()) {
            debug!(error = %e, channel, "pwm export write failed");
        }
        let channel_dir = base.join(format!("pwm{channel}"));
        if !channel_dir.is_dir() {
            return Err(DriveError::hardware(
                component,
                "channel did not appear after export",
            ));
        }
        Ok(SysfsPwm {
            channel_dir,
            component,
        })
    }

    /// Program the period, given in microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Hardware`] on a failed attribute write.
    pub fn set_period(&self, period_us: u64) -> Result<(), DriveError> {
        self.write("period", &(period_us * 1000).to_string())
    }

    /// Program the high-time, given in microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Hardware`] on a failed attribute write.
    pub fn set_duty(&self, width_us: u64) -> Result<(), DriveError> {
        self.write("duty_cycle", &(width_us * 1000).to_string())
    }

    /// Enable or disable the output.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Hardware`] on a failed attribute write.
    pub fn enable(&self, on: bool) -> Result<(), DriveError> {
        self.write("enable", if on { "1" } else { "0" })
    }

    fn write(&self, attr: &str, value: &str) -> Result<(), DriveError> {
        write_attr(&self.channel_dir.join(attr), value)
            .map_err(|e| DriveError::hardware(self.component.as_str(), e))
    }
}

fn write_attr(path: &Path, value: &str) -> io::Result<()> {
    debug!(path = %path.display(), value, "sysfs write");
    fs::write(path, value)
}
