//! Software pulse generation on a dedicated thread.
//!
//! [`PulseGenerator`] continuously drives one GPIO line high for a
//! commanded duration and low for the remainder of a fixed period. The
//! commanded duration is a single atomic shared between the control thread
//! (writer) and the generator thread (reader); both sides use relaxed
//! ordering. The generator is only guaranteed to observe *some* previously
//! written value by its next period boundary — a deliberate lock-free,
//! bounded-staleness hand-off, the only state crossing the thread boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rovd_types::DriveError;
use tracing::{debug, error, warn};

use crate::gpio::{self, GpioOut};
use crate::syspwm::SysfsPwm;

/// Software PWM: one thread, one line, one shared duration.
pub struct PulseGenerator {
    chip: String,
    line: u32,
    /// Microseconds between consecutive rising edges.
    period: u64,
    duration: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PulseGenerator {
    /// Create a generator for `line` on `chip` with `period` microseconds
    /// between consecutive rising edges. No hardware is touched until
    /// [`start`][Self::start].
    pub fn new(chip: impl Into<String>, line: u32, period: u64) -> Self {
        PulseGenerator {
            chip: chip.into(),
            line,
            period,
            duration: Arc::new(AtomicU64::new(0)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Command a new high-time in microseconds. Values at or above the
    /// period clamp to `period - 1`; the generator picks the new value up
    /// at its next period boundary.
    pub fn set_duration(&self, duration: u64) {
        let effective = duration.min(self.period.saturating_sub(1));
        self.duration.store(effective, Ordering::Relaxed);
        debug!(
            line = self.line,
            requested = duration,
            effective,
            "pulse duration updated"
        );
    }

    /// The duration currently commanded (the generator may lag behind by up
    /// to one period).
    pub fn duration(&self) -> u64 {
        self.duration.load(Ordering::Relaxed)
    }

    /// Whether the generator thread is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Acquire the line (output mode, driven low) and spawn the generator
    /// thread. Idempotent while running.
    ///
    /// # Errors
    ///
    /// Fails when the line cannot be requested; no thread is spawned in
    /// that case.
    pub fn start(&mut self) -> Result<(), DriveError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut line = gpio::open_output(&self.chip, self.line, "rovd-pwm")?;
        self.cancel.store(false, Ordering::Relaxed);
        let period = self.period;
        let duration = Arc::clone(&self.duration);
        let cancel = Arc::clone(&self.cancel);
        self.worker = Some(thread::spawn(move || {
            generate(&mut line, period, &duration, &cancel);
        }));
        debug!(chip = %self.chip, line = self.line, period, "pulse generator started");
        Ok(())
    }

    /// Signal the generator thread to exit and join it. Latency is bounded
    /// by one period plus platform sleep granularity.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.cancel.store(true, Ordering::Relaxed);
            if worker.join().is_err() {
                error!(chip = %self.chip, line = self.line, "pulse generator thread panicked");
            }
        }
    }
}

impl Drop for PulseGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The generator loop: read the duration once per iteration, hold the line
/// high for that long, low for the rest of the period, and re-check the
/// cancellation flag before going again. A failed line write is logged and
/// the cadence continues.
fn generate(line: &mut impl GpioOut, period: u64, duration: &AtomicU64, cancel: &AtomicBool) {
    while !cancel.load(Ordering::Relaxed) {
        let high_for = duration.load(Ordering::Relaxed);
        if high_for != 0 {
            if let Err(e) = line.set(true) {
                warn!(error = %e, "pulse write failed");
            }
            thread::sleep(Duration::from_micros(high_for));
        }
        if let Err(e) = line.set(false) {
            warn!(error = %e, "pulse write failed");
        }
        thread::sleep(Duration::from_micros(period - high_for));
    }
    // Leave the line low on the way out.
    let _ = line.set(false);
}

// ────────────────────────────────────────────────────────────────────────────
// Pulse backend selection
// ────────────────────────────────────────────────────────────────────────────

/// The pulse backend of a GPIO-driven actuator: a software generator thread
/// or a kernel pulse device.
pub(crate) enum PwmOutput {
    Soft(PulseGenerator),
    Hard(SysfsPwm),
}

impl PwmOutput {
    /// Arm the backend. The software generator starts pulsing with whatever
    /// duration is currently commanded (initially zero, line held low); the
    /// hardware channel is programmed with `period` and `initial_width`
    /// before its output is enabled.
    pub(crate) fn arm(&mut self, period: u64, initial_width: u64) -> Result<(), DriveError> {
        match self {
            PwmOutput::Soft(generator) => generator.start(),
            PwmOutput::Hard(pwm) => {
                pwm.set_period(period)?;
                pwm.set_duty(initial_width)?;
                pwm.enable(true)
            }
        }
    }

    /// Push a new high-time in microseconds.
    pub(crate) fn set_width(&mut self, width: u64) -> Result<(), DriveError> {
        match self {
            PwmOutput::Soft(generator) => {
                generator.set_duration(width);
                Ok(())
            }
            PwmOutput::Hard(pwm) => pwm.set_duty(width),
        }
    }

    /// Disarm the backend: join the generator thread or disable the
    /// hardware channel.
    pub(crate) fn disarm(&mut self) {
        match self {
            PwmOutput::Soft(generator) => generator.stop(),
            PwmOutput::Hard(pwm) => {
                if let Err(e) = pwm.enable(false) {
                    warn!(error = %e, "failed to disable pwm channel");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every level written to it.
    struct RecordingLine {
        writes: Arc<Mutex<Vec<bool>>>,
    }

    impl GpioOut for RecordingLine {
        fn set(&mut self, high: bool) -> Result<(), DriveError> {
            self.writes.lock().unwrap().push(high);
            Ok(())
        }
    }

    #[test]
    fn duration_clamps_to_one_below_period() {
        let generator = PulseGenerator::new("/dev/gpiochip0", 17, 100);
        generator.set_duration(99);
        assert_eq!(generator.duration(), 99);

        generator.set_duration(100);
        assert_eq!(generator.duration(), 99);

        generator.set_duration(1_000_000);
        assert_eq!(generator.duration(), 99);

        generator.set_duration(40);
        assert_eq!(generator.duration(), 40);
    }

    #[test]
    fn zero_duration_keeps_the_line_low() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut line = RecordingLine {
            writes: Arc::clone(&writes),
        };
        let duration = AtomicU64::new(0);
        let cancel = AtomicBool::new(false);

        thread::scope(|scope| {
            let worker = scope.spawn(|| generate(&mut line, 200, &duration, &cancel));
            thread::sleep(Duration::from_millis(5));
            cancel.store(true, Ordering::Relaxed);
            worker.join().unwrap();
        });

        let writes = writes.lock().unwrap();
        assert!(!writes.is_empty());
        assert!(writes.iter().all(|&high| !high), "line must stay low");
    }

    #[test]
    fn nonzero_duration_produces_high_and_low_phases() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut line = RecordingLine {
            writes: Arc::clone(&writes),
        };
        let duration = AtomicU64::new(100);
        let cancel = AtomicBool::new(false);

        thread::scope(|scope| {
            let worker = scope.spawn(|| generate(&mut line, 200, &duration, &cancel));
            thread::sleep(Duration::from_millis(10));
            cancel.store(true, Ordering::Relaxed);
            worker.join().unwrap();
        });

        let writes = writes.lock().unwrap();
        assert!(writes.iter().any(|&high| high));
        assert!(writes.iter().any(|&high| !high));
        // The loop always exits with the line low.
        assert_eq!(writes.last(), Some(&false));
    }

    #[test]
    fn cancellation_is_observed_within_one_period() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut line = RecordingLine {
            writes: Arc::clone(&writes),
        };
        let duration = AtomicU64::new(500);
        let cancel = AtomicBool::new(true); // cancelled before the first cycle

        generate(&mut line, 1000, &duration, &cancel);

        // Only the final safety write happens.
        assert_eq!(*writes.lock().unwrap(), vec![false]);
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let mut generator = PulseGenerator::new("/dev/gpiochip0", 17, 100);
        assert!(!generator.is_running());
        generator.stop();
        assert!(!generator.is_running());
    }
}
