//! Thin seam over a single GPIO output line.
//!
//! The pulse generator, the direction line of a dedicated-line engine, and
//! the auxiliary switch all drive exactly one binary output. [`GpioOut`]
//! narrows the hardware to that one operation so the logic above it can be
//! exercised against a recording fake in tests.

use gpio_cdev::{Chip, LineRequestFlags};
use rovd_types::DriveError;
use tracing::debug;

/// One binary output line.
pub trait GpioOut: Send {
    /// Drive the line high (`true`) or low (`false`).
    fn set(&mut self, high: bool) -> Result<(), DriveError>;
}

/// A requested output line on a GPIO character device.
pub struct CdevOutput {
    handle: gpio_cdev::LineHandle,
}

impl GpioOut for CdevOutput {
    fn set(&mut self, high: bool) -> Result<(), DriveError> {
        self.handle
            .set_value(u8::from(high))
            .map_err(|e| DriveError::hardware("gpio line", e))
    }
}

/// Request `line` on `chip` as an output, initially driven low.
///
/// # Errors
///
/// Returns [`DriveError::Hardware`] when the chip cannot be opened or the
/// line is unavailable (missing, or already claimed by another consumer).
pub fn open_output(chip: &str, line: u32, consumer: &str) -> Result<CdevOutput, DriveError> {
    let mut chip_dev = Chip::new(chip).map_err(|e| DriveError::hardware(chip, e))?;
    let handle = chip_dev
        .get_line(line)
        .and_then(|l| l.request(LineRequestFlags::OUTPUT, 0, consumer))
        .map_err(|e| DriveError::hardware(format!("{chip}:{line}"), e))?;
    debug!(chip, line, consumer, "requested output line");
    Ok(CdevOutput { handle })
}
