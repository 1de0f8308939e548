//! Public indicator API: the event-loop task and its handle.
//!
//! The sysfs backend is not safe to poke from multiple places at once
//! (the kernel needs its settle delay respected between writes), so the
//! backend and the state machine are owned by a single task, and the
//! public handle talks to it over a command channel. Commands and timer
//! firings are serialized by one `select!` loop; nothing in the
//! controller ever runs concurrently with itself.

use crate::backend::{DEFAULT_LEDS_ROOT, LedOutput, SysfsBackend};
use crate::controller::Controller;
use crate::request::{PatternRequest, Style};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ── Configuration ────────────────────────────────────────────────────

/// External collaborator used when no sysfs backend probes.
///
/// Stands in for the platform's native lights path; the controller only
/// forwards pattern requests to it, breathing and brightness control do
/// not exist there.
pub trait FallbackLight: Send {
    fn set_pattern(&mut self, r: u8, g: u8, b: u8, on_ms: u32, off_ms: u32) -> bool;
}

/// Controller configuration.
pub struct IndicatorConfig {
    /// Root of the kernel LED class devices.
    pub leds_root: PathBuf,
    /// Optional native-lights fallback for when probing fails.
    pub fallback: Option<Box<dyn FallbackLight>>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            leds_root: PathBuf::from(DEFAULT_LEDS_ROOT),
            fallback: None,
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the controller's accepted target.
///
/// This reflects the last accepted request, not a confirmed hardware
/// state: writes are fire-and-forget and the sysfs attributes cannot be
/// read back.
#[derive(Clone, Debug, Serialize)]
pub struct IndicatorStatus {
    /// Probed backend family name.
    pub backend: String,
    pub style: Style,
    pub color: [u8; 3],
    pub on_ms: u32,
    pub off_ms: u32,
    pub brightness: u8,
    pub breathing: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

enum Command {
    SetPattern {
        r: u8,
        g: u8,
        b: u8,
        on_ms: u32,
        off_ms: u32,
    },
    EnableBreathing(bool),
    SetBrightness(u8),
    Status(oneshot::Sender<IndicatorStatus>),
    Quit,
}

// ── Handle ───────────────────────────────────────────────────────────

/// Handle to a running indicator controller.
///
/// Dropping the handle without calling [`IndicatorLed::quit`] stops the
/// loop without the final blank-and-close sequence; call `quit` for a
/// clean release of the hardware.
pub struct IndicatorLed {
    tx: Option<mpsc::Sender<Command>>,
    task: Option<JoinHandle<()>>,
    fallback: Option<Box<dyn FallbackLight>>,
}

impl IndicatorLed {
    /// Probe the sysfs backends and start the event-loop task.
    ///
    /// On sysfs success the hardware is forced to a known black state
    /// before the first caller request. On failure the returned handle
    /// only drives the fallback collaborator, if one was configured.
    pub fn init(config: IndicatorConfig) -> Self {
        match SysfsBackend::probe(&config.leds_root) {
            Some(backend) => {
                let mut controller = Controller::new(backend);
                controller.submit(PatternRequest::default());

                let (tx, rx) = mpsc::channel(16);
                let task = tokio::spawn(run_loop(controller, rx));
                Self {
                    tx: Some(tx),
                    task: Some(task),
                    fallback: None,
                }
            }
            None => Self {
                tx: None,
                task: None,
                fallback: config.fallback,
            },
        }
    }

    /// Whether a sysfs backend was probed.
    pub fn available(&self) -> bool {
        self.tx.is_some()
    }

    /// Request a color and blink timing.
    ///
    /// Periods are clamped to [0, 60000] ms; anything below 50 ms on
    /// either side disables blinking entirely (too fast to read as an
    /// indication, looks like a failing LED). Colors clamp to [0, 255].
    /// The current brightness level and breathing setting are kept.
    pub async fn set_pattern(&mut self, r: i32, g: i32, b: i32, on_ms: i32, off_ms: i32) -> bool {
        let mut on_ms = on_ms.clamp(0, 60_000) as u32;
        let mut off_ms = off_ms.clamp(0, 60_000) as u32;
        if on_ms < 50 || off_ms < 50 {
            on_ms = 0;
            off_ms = 0;
        }
        let r = r.clamp(0, 255) as u8;
        let g = g.clamp(0, 255) as u8;
        let b = b.clamp(0, 255) as u8;

        if let Some(tx) = &self.tx {
            tx.send(Command::SetPattern {
                r,
                g,
                b,
                on_ms,
                off_ms,
            })
            .await
            .is_ok()
        } else if let Some(fallback) = &mut self.fallback {
            fallback.set_pattern(r, g, b, on_ms, off_ms)
        } else {
            // no sysfs control and nothing to fall back to
            false
        }
    }

    /// Switch the current pattern between hardware blink and software
    /// breathing. Succeeds (as a no-op) without a sysfs backend.
    pub async fn enable_breathing(&self, enable: bool) -> bool {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Command::EnableBreathing(enable)).await;
        }
        true
    }

    /// Set the global brightness level, clamped to [1, 255]. Succeeds
    /// (as a no-op) without a sysfs backend.
    pub async fn set_brightness(&self, level: i32) -> bool {
        let level = level.clamp(1, 255) as u8;
        if let Some(tx) = &self.tx {
            let _ = tx.send(Command::SetBrightness(level)).await;
        }
        true
    }

    /// Snapshot the accepted target. `None` without a sysfs backend.
    pub async fn status(&self) -> Option<IndicatorStatus> {
        let tx = self.tx.as_ref()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Status(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Stop the loop, blank the LED, and release the hardware.
    pub async fn quit(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Command::Quit).await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

// ── Event loop ───────────────────────────────────────────────────────

async fn run_loop(mut controller: Controller<SysfsBackend>, mut rx: mpsc::Receiver<Command>) {
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                None | Some(Command::Quit) => break,
                Some(cmd) => apply_command(&mut controller, cmd),
            },
            () = sleep_until_opt(controller.settle_deadline()) => controller.fire_settle(),
            () = sleep_until_opt(controller.step_deadline()) => controller.fire_step(),
        }
    }
    controller.shutdown().await;
}

fn apply_command(controller: &mut Controller<SysfsBackend>, cmd: Command) {
    match cmd {
        Command::SetPattern {
            r,
            g,
            b,
            on_ms,
            off_ms,
        } => {
            let mut request = controller.target();
            request.r = r;
            request.g = g;
            request.b = b;
            request.on_ms = on_ms;
            request.off_ms = off_ms;
            controller.submit(request);
        }
        Command::EnableBreathing(enable) => {
            let mut request = controller.target();
            request.breathe = enable;
            controller.submit(request);
        }
        Command::SetBrightness(level) => {
            let mut request = controller.target();
            request.level = level;
            controller.submit(request);
        }
        Command::Status(reply) => {
            let target = controller.target();
            let _ = reply.send(IndicatorStatus {
                backend: controller.output().name().to_string(),
                style: target.style(),
                color: [target.r, target.g, target.b],
                on_ms: target.on_ms,
                off_ms: target.off_ms,
                brightness: target.level,
                breathing: target.breathe,
            });
        }
        Command::Quit => unreachable!("handled by the loop"),
    }
}

/// Wait for an optional deadline; absent deadlines never complete.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
