//! Backend probing and the probed capability object.
//!
//! Two kernel driver generations expose mutually-incompatible sysfs
//! layouts for the same RGB indicator. Probing tries them in a fixed
//! priority order and the first family whose three channels all open
//! wins; a partial open is unwound completely before the next family is
//! tried. The rest of the crate only ever talks to the winner through
//! the [`LedOutput`] trait, which keeps the controller testable without
//! hardware.

use crate::channel::{Channel, ChannelPaths, TimingPaths};
use std::path::Path;

/// Where the kernel exposes LED class devices.
pub const DEFAULT_LEDS_ROOT: &str = "/sys/class/leds";

// ── Capability surface ───────────────────────────────────────────────

/// Uniform control surface over a probed backend.
///
/// All operations are fire-and-forget: the sysfs attributes are
/// write-only, so there is no confirmed state to report back.
pub trait LedOutput {
    /// Enable or disable the LED outputs. May be a no-op; only the
    /// Hammerhead family has a dedicated switch.
    fn enable(&mut self, _enable: bool) {}

    /// Write hardware blink timing to all three channels.
    fn blink(&mut self, on_ms: u32, off_ms: u32);

    /// Write an instantaneous color to all three channels.
    fn value(&mut self, r: u8, g: u8, b: u8);

    /// Release all channel handles. Idempotent.
    fn close(&mut self);

    /// Short family name, for logs and status reporting.
    fn name(&self) -> &'static str;
}

// ── Sysfs backend ────────────────────────────────────────────────────

/// The two supported sysfs attribute layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// Per channel: `brightness`, `max_brightness`, `blink_delay_on`,
    /// `blink_delay_off`.
    Vanilla,
    /// Per channel: `brightness`, `max_brightness`, `on_off_ms`
    /// (combined `"<on> <off>"` write), `rgb_start` (enable switch).
    Hammerhead,
}

impl Family {
    fn name(self) -> &'static str {
        match self {
            Family::Vanilla => "vanilla",
            Family::Hammerhead => "hammerhead",
        }
    }

    /// Attribute paths for the R, G, B channels, in that order.
    fn channel_paths(self, root: &Path) -> [ChannelPaths; 3] {
        match self {
            Family::Vanilla => ["led:rgb_red", "led:rgb_green", "led:rgb_blue"].map(|dir| {
                let base = root.join(dir);
                ChannelPaths {
                    max: base.join("max_brightness"),
                    value: base.join("brightness"),
                    timing: TimingPaths::Split {
                        on: base.join("blink_delay_on"),
                        off: base.join("blink_delay_off"),
                    },
                    enable: None,
                }
            }),
            Family::Hammerhead => ["red", "green", "blue"].map(|dir| {
                let base = root.join(dir);
                ChannelPaths {
                    max: base.join("max_brightness"),
                    value: base.join("brightness"),
                    timing: TimingPaths::Combined(base.join("on_off_ms")),
                    enable: Some(base.join("rgb_start")),
                }
            }),
        }
    }
}

/// A successfully probed set of R, G, B channel handles.
///
/// At most one backend is active per controller; the channels are
/// exclusively owned here for the controller's whole lifetime.
pub struct SysfsBackend {
    family: Family,
    /// R, G, B while open; emptied by `close()`.
    channels: Vec<Channel>,
}

impl SysfsBackend {
    /// Probe the supported families in priority order.
    ///
    /// Returns `None` when neither layout is present, which callers
    /// report as "no sysfs control" and hand to their fallback path.
    pub fn probe(leds_root: &Path) -> Option<Self> {
        for family in [Family::Vanilla, Family::Hammerhead] {
            if let Some(backend) = Self::probe_family(leds_root, family) {
                tracing::info!(backend = backend.name(), "led sysfs backend probed");
                return Some(backend);
            }
        }
        tracing::info!("no led sysfs backend available");
        None
    }

    fn probe_family(root: &Path, family: Family) -> Option<Self> {
        let mut channels = Vec::with_capacity(3);
        for paths in family.channel_paths(root) {
            // an early return here drops whatever already opened,
            // unwinding the family as a whole
            channels.push(Channel::open(&paths)?);
        }
        Some(Self { family, channels })
    }

    pub fn family(&self) -> Family {
        self.family
    }
}

impl LedOutput for SysfsBackend {
    fn enable(&mut self, enable: bool) {
        for channel in &mut self.channels {
            channel.set_enabled(enable);
        }
    }

    fn blink(&mut self, on_ms: u32, off_ms: u32) {
        self.enable(false);
        for channel in &mut self.channels {
            channel.set_timing(on_ms, off_ms);
        }
    }

    fn value(&mut self, r: u8, g: u8, b: u8) {
        // the Hammerhead PWM block glitches visibly if brightness changes
        // while running, so wrap the write in a disable/enable pair
        self.enable(false);
        for (channel, value) in self.channels.iter_mut().zip([r, g, b]) {
            channel.set_value(value);
        }
        self.enable(true);
    }

    fn close(&mut self) {
        self.channels.clear();
    }

    fn name(&self) -> &'static str {
        self.family.name()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
