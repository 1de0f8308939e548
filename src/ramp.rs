//! Breathing ramp synthesis.
//!
//! The kernel drivers only expose instantaneous brightness and hardware
//! blink timing, so a smooth "breathing" pulse has to be rendered in
//! software: a bounded table of intensity samples, consumed cyclically by
//! the controller's step timer. A quarter-sine ease on both the rise and
//! the fall keeps the pulse perceptually smooth while the table stays at a
//! fixed maximum size regardless of the requested period.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

/// Maximum number of samples in one ramp, rise and fall combined.
pub const MAX_STEPS: u64 = 256;

/// Minimum number of samples on either the rise or the fall side.
pub const MIN_STEPS: u64 = 7;

/// Minimum delay between intensity adjustments, in milliseconds.
pub const STEP_DELAY_FLOOR_MS: u64 = 20;

/// Shortest half-period that still fits `MIN_STEPS` adjustments;
/// below this, breathing falls back to a plain hardware blink.
pub const MIN_BREATHE_PERIOD_MS: u32 = (STEP_DELAY_FLOOR_MS * MIN_STEPS) as u32;

/// A generated intensity curve plus the cursor consuming it.
#[derive(Clone, Debug)]
pub struct RampTable {
    samples: Vec<u8>,
    cursor: usize,
    delay: Duration,
}

impl RampTable {
    /// Build the intensity table for one full breathing cycle.
    ///
    /// The step delay is `ceil(period / MAX_STEPS)`, floored to
    /// `STEP_DELAY_FLOOR_MS`, which bounds the sample count to `MAX_STEPS`
    /// by construction. The samples are split between rise and fall in
    /// proportion to the requested on/off times.
    pub fn generate(on_ms: u32, off_ms: u32) -> Self {
        let t = u64::from(on_ms) + u64::from(off_ms);
        debug_assert!(t > 0, "ramp requires a non-zero period");

        let s = t.div_ceil(MAX_STEPS).max(STEP_DELAY_FLOOR_MS);
        let n = t.div_ceil(s);

        let steps_on = (n * u64::from(on_ms) + t / 2) / t;
        let steps_off = n - steps_on;

        let mut samples = Vec::with_capacity(n as usize);
        for i in 0..steps_on {
            let a = i as f32 * FRAC_PI_2 / steps_on as f32;
            samples.push((a.sin() * 255.0).round() as u8);
        }
        for i in 0..steps_off {
            let a = FRAC_PI_2 + i as f32 * FRAC_PI_2 / steps_off as f32;
            samples.push((a.sin() * 255.0).round() as u8);
        }

        tracing::debug!(delay_ms = s, steps_on, steps_off, "generated breathing ramp");

        Self {
            samples,
            cursor: 0,
            delay: Duration::from_millis(s),
        }
    }

    /// Delay between consecutive samples.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Position of the next sample to be consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the next intensity sample, wrapping back to the start of the
    /// table at the end of the cycle.
    pub fn next_sample(&mut self) -> u8 {
        if self.cursor >= self.samples.len() {
            self.cursor = 0;
        }
        let sample = self.samples[self.cursor];
        self.cursor += 1;
        sample
    }
}
