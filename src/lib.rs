//! Status-LED pattern controller for sysfs-driven RGB indicators.
//!
//! The kernel exposes the indicator as raw, write-only attribute files in
//! one of two mutually-incompatible layouts, and needs a short settle
//! delay between successive writes. This crate probes the layout at
//! runtime, synthesizes blinking and smooth "breathing" patterns from the
//! raw primitives, and schedules every hardware write through a timing
//! state machine that respects the settle delay.
//!
//! ## Architecture
//! - [`channel`] / [`backend`]: per-channel sysfs primitives and the
//!   probed capability object ([`SysfsBackend`]).
//! - [`request`]: sanitized pattern requests and the
//!   Off/Static/Blink/Breathe classifier.
//! - [`ramp`]: the quarter-sine breathing curve, bounded to 256 samples.
//! - [`controller`]: the settle → target timing state machine.
//! - [`service`]: the event-loop task and the public [`IndicatorLed`]
//!   handle. All hardware access is serialized onto that one task.

pub mod backend;
pub mod channel;
pub mod controller;
pub mod ramp;
pub mod request;
pub mod service;

pub use backend::{DEFAULT_LEDS_ROOT, Family, LedOutput, SysfsBackend};
pub use controller::{Controller, Phase, SETTLE_DELAY};
pub use ramp::RampTable;
pub use request::{PatternRequest, Style};
pub use service::{FallbackLight, IndicatorConfig, IndicatorLed, IndicatorStatus};
