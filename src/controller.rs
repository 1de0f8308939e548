//! The timing state machine.
//!
//! The kernel side needs a short settle delay between successive attribute
//! writes, and a non-zero blink attribute has to be cleared before a value
//! write takes effect. So there is no one correct "current state" until
//! this state machine confirms it: every accepted request runs through a
//! settle → target pipeline built on two deadline-slot timers, a one-shot
//! settle timer and a step timer that is either a one-shot (static/blink
//! target write) or recurring (breathing samples).
//!
//! The single optimization that matters: when a breathing animation is
//! running and the new request breathes with the same timing, only the
//! color/brightness target changes and the running step timer keeps
//! consuming the existing ramp. Everything else restarts the pipeline.

use crate::backend::LedOutput;
use crate::channel::scale_value;
use crate::ramp::RampTable;
use crate::request::{PatternRequest, Style};
use std::time::Duration;
use tokio::time::Instant;

/// Guesstimate of how long the kernel's delayed work takes to land.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

// ── Phase ────────────────────────────────────────────────────────────

/// Where the settle → target pipeline currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No timers pending; hardware is at the current pattern state.
    Idle,
    /// One-shot settle timer pending; hardware not yet at the target.
    Settling,
    /// One-shot target write pending after the settle cycle.
    StaticArmed,
    /// Recurring breathing step timer armed.
    BreathingArmed,
}

// ── Controller ───────────────────────────────────────────────────────

/// Drives one [`LedOutput`] through sanitized pattern requests.
///
/// All methods must be called from a single task; the two timer slots
/// are plain deadlines that the owning event loop waits on and fires.
pub struct Controller<O: LedOutput> {
    output: O,
    /// Last accepted request, or `None` before the first one so the
    /// initial write can never be skipped as a no-op.
    current: Option<PatternRequest>,
    phase: Phase,
    /// Breathing curve; `None` whenever breathing is not active.
    ramp: Option<RampTable>,
    /// Blink attributes must be written to zero on the next settle fire.
    clear_blink: bool,
    settle_at: Option<Instant>,
    step_at: Option<Instant>,
}

impl<O: LedOutput> Controller<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            current: None,
            phase: Phase::Idle,
            ramp: None,
            clear_blink: false,
            settle_at: None,
            step_at: None,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The accepted target, or the default (dark, full level) before the
    /// first request. Field-tweak updates (brightness, breathing) start
    /// from this.
    pub fn target(&self) -> PatternRequest {
        self.current.unwrap_or_default()
    }

    /// Pending settle deadline, if any.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle_at
    }

    /// Pending step deadline, if any.
    pub fn step_deadline(&self) -> Option<Instant> {
        self.step_at
    }

    /// Accept a new pattern request.
    ///
    /// Sanitizes, drops exact duplicates, decides restart versus
    /// breathing continuation, commits the new state, and (re)arms the
    /// settle timer when a restart is needed. No hardware write happens
    /// here; writes are issued from the timer fire handlers.
    pub fn submit(&mut self, request: PatternRequest) {
        let request = request.sanitized();

        if self.current == Some(request) {
            return;
        }

        let old_style = self.current.map_or(Style::Off, |c| c.style());
        let new_style = request.style();

        // An in-flight breathing animation survives a target change as
        // long as the timing is identical: blinking is not in use and the
        // step timer already keeps the writes far enough apart.
        let continue_breathing = old_style == Style::Breathe
            && new_style == Style::Breathe
            && self.current.is_some_and(|c| c.timing_eq(&request));

        self.current = Some(request);

        if continue_breathing {
            tracing::debug!("breathing continues with a new target");
            return;
        }

        self.step_at = None;
        self.ramp = None;
        if new_style == Style::Breathe {
            self.ramp = Some(RampTable::generate(request.on_ms, request.off_ms));
        }

        // A pending settle timer is never duplicated; the new target
        // simply waits for it and is picked up when it fires.
        if self.settle_at.is_none() {
            self.clear_blink = old_style == Style::Blink || new_style == Style::Blink;
            self.settle_at = Some(Instant::now() + SETTLE_DELAY);
        }
        self.phase = Phase::Settling;

        tracing::debug!(
            ?old_style,
            ?new_style,
            clear_blink = self.clear_blink,
            "pattern restart scheduled"
        );
    }

    /// Settle timer fired: the kernel has finished the previous change.
    ///
    /// Clears the blink attributes if needed, then either finishes (no
    /// color), arms the recurring breathing timer, or arms the one-shot
    /// target write after another kernel settle delay.
    pub fn fire_settle(&mut self) {
        self.settle_at = None;

        let clear = std::mem::take(&mut self.clear_blink);
        if clear {
            // blinking off; must be followed by a value write to take effect
            self.output.blink(0, 0);
        }

        let current = self.target();
        let mut blank = clear;

        if !current.has_color() {
            blank = true;
            self.phase = Phase::Idle;
        } else if let Some(delay) = self.ramp.as_ref().map(RampTable::delay) {
            self.step_at = Some(Instant::now() + delay);
            self.phase = Phase::BreathingArmed;
        } else {
            self.step_at = Some(Instant::now() + SETTLE_DELAY);
            self.phase = Phase::StaticArmed;
        }

        if blank {
            // dark until the target write lands
            self.output.value(0, 0, 0);
        }
    }

    /// Step timer fired: write the static target once, or take the next
    /// breathing sample and stay armed.
    pub fn fire_step(&mut self) {
        let current = self.target();

        match self.phase {
            Phase::StaticArmed => {
                self.step_at = None;
                let (r, g, b) = current.level_scaled();
                self.output.blink(current.on_ms, current.off_ms);
                self.output.value(r, g, b);
                self.phase = Phase::Idle;
            }
            Phase::BreathingArmed => {
                let Some(ramp) = self.ramp.as_mut() else {
                    self.step_at = None;
                    return;
                };
                let sample = i32::from(ramp.next_sample());
                let delay = ramp.delay();

                // scale the target by the global level, then by the curve
                let (r, g, b) = current.level_scaled();
                self.output.value(
                    scale_value(r, sample) as u8,
                    scale_value(g, sample) as u8,
                    scale_value(b, sample) as u8,
                );

                self.step_at = Some(Instant::now() + delay);
            }
            Phase::Idle | Phase::Settling => {
                self.step_at = None;
            }
        }
    }

    /// Stop everything and release the hardware.
    ///
    /// The one place the controller is allowed to wait: a single settle
    /// delay so the last issued write lands before the blink and value
    /// attributes are forced off and the handles are closed.
    pub async fn shutdown(&mut self) {
        self.settle_at = None;
        self.step_at = None;
        self.ramp = None;
        self.phase = Phase::Idle;

        tokio::time::sleep(SETTLE_DELAY).await;

        self.output.blink(0, 0);
        self.output.value(0, 0, 0);
        self.output.close();
        tracing::debug!("led controller shut down");
    }

    #[cfg(test)]
    fn ramp(&self) -> Option<&RampTable> {
        self.ramp.as_ref()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Op {
        Enable(bool),
        Blink(u32, u32),
        Value(u8, u8, u8),
        Close,
    }

    #[derive(Default)]
    struct MockOutput {
        ops: Vec<Op>,
    }

    impl LedOutput for MockOutput {
        fn enable(&mut self, enable: bool) {
            self.ops.push(Op::Enable(enable));
        }
        fn blink(&mut self, on_ms: u32, off_ms: u32) {
            self.ops.push(Op::Blink(on_ms, off_ms));
        }
        fn value(&mut self, r: u8, g: u8, b: u8) {
            self.ops.push(Op::Value(r, g, b));
        }
        fn close(&mut self) {
            self.ops.push(Op::Close);
        }
        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn controller() -> Controller<MockOutput> {
        Controller::new(MockOutput::default())
    }

    fn red_breathe() -> PatternRequest {
        PatternRequest {
            r: 255,
            on_ms: 500,
            off_ms: 500,
            breathe: true,
            ..PatternRequest::default()
        }
    }

    /// Drive the settle fire and, for static targets, the follow-up write.
    fn settle_to_idle(ctrl: &mut Controller<MockOutput>) {
        ctrl.fire_settle();
        if ctrl.phase() == Phase::StaticArmed {
            ctrl.fire_step();
        }
    }

    #[test]
    fn first_request_is_never_skipped() {
        let mut ctrl = controller();
        // the very first submit, even all-black, must reach the hardware
        ctrl.submit(PatternRequest::default());
        assert_eq!(ctrl.phase(), Phase::Settling);
        assert!(ctrl.settle_deadline().is_some());

        ctrl.fire_settle();
        assert_eq!(ctrl.phase(), Phase::Idle);
        assert_eq!(ctrl.output().ops, vec![Op::Value(0, 0, 0)]);
        assert!(ctrl.step_deadline().is_none());
    }

    #[test]
    fn duplicate_request_is_a_no_op() {
        let mut ctrl = controller();
        let req = PatternRequest {
            r: 200,
            g: 100,
            ..PatternRequest::default()
        };
        ctrl.submit(req);
        settle_to_idle(&mut ctrl);
        let ops_before = ctrl.output().ops.clone();

        ctrl.submit(req);
        assert_eq!(ctrl.output().ops, ops_before);
        assert_eq!(ctrl.phase(), Phase::Idle);
        assert!(ctrl.settle_deadline().is_none());
        assert!(ctrl.step_deadline().is_none());
    }

    #[test]
    fn sanitized_duplicate_is_also_a_no_op() {
        let mut ctrl = controller();
        // black with timing sanitizes to plain black
        ctrl.submit(PatternRequest {
            on_ms: 500,
            off_ms: 500,
            breathe: true,
            ..PatternRequest::default()
        });
        settle_to_idle(&mut ctrl);
        let ops_before = ctrl.output().ops.clone();

        ctrl.submit(PatternRequest::default());
        assert_eq!(ctrl.output().ops, ops_before);
    }

    #[test]
    fn static_target_writes_after_two_timer_hops() {
        let mut ctrl = controller();
        ctrl.submit(PatternRequest {
            r: 255,
            g: 128,
            ..PatternRequest::default()
        });

        ctrl.fire_settle();
        // no blink involved, so no blanking write in between
        assert_eq!(ctrl.phase(), Phase::StaticArmed);
        assert!(ctrl.output().ops.is_empty());
        assert!(ctrl.step_deadline().is_some());

        ctrl.fire_step();
        assert_eq!(
            ctrl.output().ops,
            vec![Op::Blink(0, 0), Op::Value(255, 128, 0)]
        );
        assert_eq!(ctrl.phase(), Phase::Idle);
        assert!(ctrl.step_deadline().is_none());
    }

    #[test]
    fn blink_transition_clears_blink_and_blanks_first() {
        let mut ctrl = controller();
        ctrl.submit(PatternRequest {
            r: 255,
            ..PatternRequest::default()
        });
        settle_to_idle(&mut ctrl);

        ctrl.submit(PatternRequest {
            r: 255,
            on_ms: 500,
            off_ms: 500,
            ..PatternRequest::default()
        });
        ctrl.fire_settle();
        // entering blink: zero the blink attributes, then hold dark
        // until the target write lands
        assert_eq!(
            ctrl.output().ops[2..].to_vec(),
            vec![Op::Blink(0, 0), Op::Value(0, 0, 0)]
        );
        assert_eq!(ctrl.phase(), Phase::StaticArmed);

        ctrl.fire_step();
        assert_eq!(
            ctrl.output().ops[4..].to_vec(),
            vec![Op::Blink(500, 500), Op::Value(255, 0, 0)]
        );
    }

    #[test]
    fn leaving_blink_also_sets_the_clear_flag() {
        let mut ctrl = controller();
        ctrl.submit(PatternRequest {
            g: 255,
            on_ms: 500,
            off_ms: 500,
            ..PatternRequest::default()
        });
        settle_to_idle(&mut ctrl);

        ctrl.submit(PatternRequest {
            g: 255,
            ..PatternRequest::default()
        });
        ctrl.fire_settle();
        assert_eq!(
            ctrl.output().ops[4..].to_vec(),
            vec![Op::Blink(0, 0), Op::Value(0, 0, 0)]
        );
    }

    #[test]
    fn breathing_arms_the_recurring_step_timer() {
        let mut ctrl = controller();
        ctrl.submit(red_breathe());
        assert!(ctrl.ramp().is_some());

        ctrl.fire_settle();
        assert_eq!(ctrl.phase(), Phase::BreathingArmed);
        assert!(ctrl.step_deadline().is_some());

        // first sample of the quarter-sine rise is zero intensity
        ctrl.fire_step();
        assert_eq!(ctrl.output().ops, vec![Op::Value(0, 0, 0)]);
        assert!(ctrl.step_deadline().is_some(), "stays armed");

        ctrl.fire_step();
        let Op::Value(r, 0, 0) = ctrl.output().ops[1] else {
            panic!("expected a red value write");
        };
        assert!(r > 0, "intensity rises");
    }

    #[test]
    fn equal_timing_breathe_change_continues_without_restart() {
        let mut ctrl = controller();
        ctrl.submit(red_breathe());
        ctrl.fire_settle();
        for _ in 0..3 {
            ctrl.fire_step();
        }
        let cursor = ctrl.ramp().unwrap().cursor();
        assert_eq!(cursor, 3);

        // same timing, different color: the running animation survives
        let green = PatternRequest {
            r: 0,
            g: 255,
            ..red_breathe()
        };
        ctrl.submit(green);
        assert_eq!(ctrl.phase(), Phase::BreathingArmed);
        assert!(ctrl.settle_deadline().is_none(), "no settle cycle");
        assert_eq!(ctrl.ramp().unwrap().cursor(), cursor, "ramp not regenerated");

        ctrl.fire_step();
        let Op::Value(0, g, 0) = *ctrl.output().ops.last().unwrap() else {
            panic!("expected a green value write");
        };
        assert!(g > 0);
    }

    #[test]
    fn brightness_change_during_breathing_continues_too() {
        let mut ctrl = controller();
        ctrl.submit(red_breathe());
        ctrl.fire_settle();
        ctrl.fire_step();

        let dimmed = PatternRequest {
            level: 128,
            ..red_breathe()
        };
        ctrl.submit(dimmed);
        assert_eq!(ctrl.phase(), Phase::BreathingArmed);
        assert!(ctrl.settle_deadline().is_none());
    }

    #[test]
    fn different_timing_restarts_breathing() {
        let mut ctrl = controller();
        ctrl.submit(red_breathe());
        ctrl.fire_settle();
        for _ in 0..5 {
            ctrl.fire_step();
        }

        let slower = PatternRequest {
            on_ms: 1000,
            off_ms: 1000,
            ..red_breathe()
        };
        ctrl.submit(slower);
        assert_eq!(ctrl.phase(), Phase::Settling);
        assert!(ctrl.settle_deadline().is_some());
        assert!(ctrl.step_deadline().is_none(), "step timer cancelled");
        assert_eq!(ctrl.ramp().unwrap().cursor(), 0, "fresh ramp");
    }

    #[test]
    fn brightness_change_during_blink_restarts() {
        let mut ctrl = controller();
        let blink = PatternRequest {
            b: 255,
            on_ms: 500,
            off_ms: 500,
            ..PatternRequest::default()
        };
        ctrl.submit(blink);
        settle_to_idle(&mut ctrl);

        // only the level changed, but blink edges must stay in sync:
        // full restart, no continuation shortcut outside breathing
        ctrl.submit(PatternRequest { level: 64, ..blink });
        assert_eq!(ctrl.phase(), Phase::Settling);
        assert!(ctrl.settle_deadline().is_some());
    }

    #[test]
    fn pending_settle_timer_is_not_duplicated() {
        let mut ctrl = controller();
        ctrl.submit(PatternRequest {
            r: 255,
            ..PatternRequest::default()
        });
        let deadline = ctrl.settle_deadline();

        ctrl.submit(PatternRequest {
            g: 255,
            ..PatternRequest::default()
        });
        assert_eq!(ctrl.settle_deadline(), deadline);

        // the settle fire picks up the latest target
        ctrl.fire_settle();
        ctrl.fire_step();
        assert_eq!(
            ctrl.output().ops,
            vec![Op::Blink(0, 0), Op::Value(0, 255, 0)]
        );
    }

    #[test]
    fn breathing_samples_scale_by_level_and_curve() {
        let mut ctrl = controller();
        ctrl.submit(PatternRequest {
            level: 128,
            ..red_breathe()
        });
        ctrl.fire_settle();

        // advance past the dark start of the rise
        for _ in 0..10 {
            ctrl.fire_step();
        }
        for op in &ctrl.output().ops {
            let Op::Value(r, 0, 0) = *op else {
                panic!("breathing writes values only");
            };
            // level 128 caps the red channel at half intensity
            assert!(r <= 128);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_blanks_and_closes() {
        let mut ctrl = controller();
        ctrl.submit(red_breathe());
        ctrl.fire_settle();

        ctrl.shutdown().await;
        assert_eq!(
            ctrl.output().ops,
            vec![Op::Blink(0, 0), Op::Value(0, 0, 0), Op::Close]
        );
        assert!(ctrl.settle_deadline().is_none());
        assert!(ctrl.step_deadline().is_none());
        assert_eq!(ctrl.phase(), Phase::Idle);
    }
}
