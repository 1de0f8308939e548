//! Pattern requests: a normalized description of the desired LED appearance.
//!
//! Every public call produces a fresh request, which is sanitized once and
//! never mutated afterwards. The style classifier reduces a sanitized
//! request to one of four display styles that the controller dispatches on.

use crate::channel::scale_value;
use crate::ramp::MIN_BREATHE_PERIOD_MS;
use serde::Serialize;

// ── Request ──────────────────────────────────────────────────────────

/// Requested LED appearance: color, blink timing, brightness, breathing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternRequest {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Milliseconds the LED stays lit per blink cycle (0 = no blinking).
    pub on_ms: u32,
    /// Milliseconds the LED stays dark per blink cycle (0 = no blinking).
    pub off_ms: u32,
    /// Global brightness level, 1 = minimum, 255 = maximum.
    pub level: u8,
    /// Render the on/off cycle as a smooth software pulse instead of
    /// a hardware blink.
    pub breathe: bool,
}

impl Default for PatternRequest {
    fn default() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            on_ms: 0,
            off_ms: 0,
            level: 255,
            breathe: false,
        }
    }
}

impl PatternRequest {
    /// True when at least one channel is lit.
    pub fn has_color(&self) -> bool {
        self.r > 0 || self.g > 0 || self.b > 0
    }

    /// True when both halves of the blink period match `other`.
    ///
    /// Used by the controller to decide whether a running breathing
    /// animation can continue across a target change.
    pub fn timing_eq(&self, other: &Self) -> bool {
        self.on_ms == other.on_ms && self.off_ms == other.off_ms
    }

    /// Normalize the request so the controller only ever sees patterns
    /// the hardware and the ramp synthesizer can express.
    pub fn sanitized(mut self) -> Self {
        if !self.has_color() {
            // blinking or breathing between black and black makes no sense
            self.on_ms = 0;
            self.off_ms = 0;
            self.breathe = false;
        } else if self.on_ms == 0 || self.off_ms == 0 {
            // both halves of the period must be positive for blinking
            self.on_ms = 0;
            self.off_ms = 0;
            self.breathe = false;
        } else if self.on_ms < MIN_BREATHE_PERIOD_MS || self.off_ms < MIN_BREATHE_PERIOD_MS {
            // intensity can only be adjusted so often; rise/fall times below
            // the floor cannot fit enough steps to look smooth, so fall back
            // to a plain hardware blink with the requested timing
            self.breathe = false;
        }
        self
    }

    /// Classify a sanitized request into a display style.
    pub fn style(&self) -> Style {
        if !self.has_color() {
            Style::Off
        } else if self.on_ms == 0 || self.off_ms == 0 {
            Style::Static
        } else if self.breathe {
            Style::Breathe
        } else {
            Style::Blink
        }
    }

    /// Target color with the global brightness level applied.
    pub fn level_scaled(&self) -> (u8, u8, u8) {
        let l = i32::from(self.level);
        (
            scale_value(self.r, l) as u8,
            scale_value(self.g, l) as u8,
            scale_value(self.b, l) as u8,
        )
    }
}

// ── Style ────────────────────────────────────────────────────────────

/// What a sanitized request asks the LED to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    /// LED is dark.
    Off,
    /// Constant color.
    Static,
    /// Hardware blink with on/off periods.
    Blink,
    /// Software-rendered smooth pulse.
    Breathe,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn request(r: u8, g: u8, b: u8, on_ms: u32, off_ms: u32, breathe: bool) -> PatternRequest {
        PatternRequest {
            r,
            g,
            b,
            on_ms,
            off_ms,
            breathe,
            ..PatternRequest::default()
        }
    }

    #[rstest]
    #[case(0, 0, false)]
    #[case(500, 500, false)]
    #[case(500, 500, true)]
    fn black_is_always_off(#[case] on_ms: u32, #[case] off_ms: u32, #[case] breathe: bool) {
        let req = request(0, 0, 0, on_ms, off_ms, breathe).sanitized();
        assert_eq!(req.style(), Style::Off);
        assert_eq!((req.on_ms, req.off_ms, req.breathe), (0, 0, false));
    }

    #[rstest]
    #[case(0, 500)]
    #[case(500, 0)]
    #[case(0, 0)]
    fn zero_half_period_forces_static(#[case] on_ms: u32, #[case] off_ms: u32) {
        let req = request(255, 0, 0, on_ms, off_ms, true).sanitized();
        assert_eq!((req.on_ms, req.off_ms, req.breathe), (0, 0, false));
        assert_eq!(req.style(), Style::Static);
    }

    #[rstest]
    #[case(139, 500)]
    #[case(500, 139)]
    #[case(50, 60)]
    fn short_period_downgrades_breathe_to_blink(#[case] on_ms: u32, #[case] off_ms: u32) {
        let req = request(0, 255, 0, on_ms, off_ms, true).sanitized();
        assert!(!req.breathe);
        // blink timing itself is preserved
        assert_eq!((req.on_ms, req.off_ms), (on_ms, off_ms));
        assert_eq!(req.style(), Style::Blink);
    }

    #[test]
    fn long_enough_period_keeps_breathe() {
        let req = request(0, 0, 255, 140, 140, true).sanitized();
        assert!(req.breathe);
        assert_eq!(req.style(), Style::Breathe);
    }

    #[test]
    fn valid_timing_without_breathe_is_blink() {
        let req = request(255, 255, 0, 500, 1000, false).sanitized();
        assert_eq!(req.style(), Style::Blink);
    }

    #[test]
    fn timing_eq_ignores_color_and_level() {
        let a = request(255, 0, 0, 500, 500, true);
        let mut b = request(0, 255, 0, 500, 500, true);
        b.level = 10;
        assert!(a.timing_eq(&b));
        b.off_ms = 501;
        assert!(!a.timing_eq(&b));
    }

    #[test]
    fn level_scaling_rounds_to_nearest() {
        let mut req = request(255, 128, 1, 0, 0, false);
        req.level = 128;
        let (r, g, b) = req.level_scaled();
        assert_eq!((r, g, b), (128, 64, 1));

        req.level = 255;
        assert_eq!(req.level_scaled(), (255, 128, 1));
    }
}
