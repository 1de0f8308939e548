//! Per-channel sysfs primitives.
//!
//! One `Channel` owns the open attribute files for a single LED color.
//! The kernel attributes are write-only and best-effort: a failed write
//! leaves the channel at whatever the hardware last held, and is not
//! surfaced to the caller.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

// ── Paths ────────────────────────────────────────────────────────────

/// How a channel's blink timing is written.
#[derive(Clone, Debug)]
pub enum TimingPaths {
    /// Independent on-delay and off-delay attributes.
    Split { on: PathBuf, off: PathBuf },
    /// A single attribute taking `"<on_ms> <off_ms>"`.
    Combined(PathBuf),
}

/// Attribute files for one color channel.
#[derive(Clone, Debug)]
pub struct ChannelPaths {
    /// Maximum intensity, read once during probing.
    pub max: PathBuf,
    /// Instantaneous intensity, write.
    pub value: PathBuf,
    pub timing: TimingPaths,
    /// Optional enable/disable switch, write.
    pub enable: Option<PathBuf>,
}

// ── Channel ──────────────────────────────────────────────────────────

enum TimingFiles {
    Split { on: File, off: File },
    Combined(File),
}

/// Open attribute handles for one color channel.
///
/// Handles are released when the channel is dropped.
pub struct Channel {
    max: i32,
    value: File,
    timing: TimingFiles,
    enable: Option<File>,
}

impl Channel {
    /// Open all attributes for one channel.
    ///
    /// Returns `None` if the maximum intensity is unreadable or not
    /// positive, or if any attribute cannot be opened. A missing file
    /// means this backend family is simply not present here; anything
    /// else is logged before being treated the same way.
    pub fn open(paths: &ChannelPaths) -> Option<Self> {
        let max = read_number(&paths.max)?;
        if max <= 0 {
            return None;
        }

        let value = open_attr(&paths.value)?;
        let timing = match &paths.timing {
            TimingPaths::Split { on, off } => TimingFiles::Split {
                on: open_attr(on)?,
                off: open_attr(off)?,
            },
            TimingPaths::Combined(path) => TimingFiles::Combined(open_attr(path)?),
        };
        let enable = match &paths.enable {
            Some(path) => Some(open_attr(path)?),
            None => None,
        };

        Some(Self {
            max,
            value,
            timing,
            enable,
        })
    }

    /// Reported maximum intensity for this channel.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Write an intensity value, scaled from the 0-255 input range to
    /// the channel's own range. Best-effort.
    pub fn set_value(&mut self, value: u8) {
        let scaled = scale_value(value, self.max);
        let _ = writeln!(self.value, "{scaled}");
    }

    /// Write blink timing. Best-effort.
    pub fn set_timing(&mut self, on_ms: u32, off_ms: u32) {
        match &mut self.timing {
            TimingFiles::Split { on, off } => {
                let _ = writeln!(on, "{on_ms}");
                let _ = writeln!(off, "{off_ms}");
            }
            TimingFiles::Combined(file) => {
                let _ = writeln!(file, "{on_ms} {off_ms}");
            }
        }
    }

    /// Write the enable switch, if this channel has one. Best-effort.
    pub fn set_enabled(&mut self, enabled: bool) {
        if let Some(file) = &mut self.enable {
            let _ = writeln!(file, "{}", u8::from(enabled));
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Scale a 0-255 input onto a channel's 0-max range, rounding to nearest.
pub fn scale_value(value: u8, max: i32) -> i32 {
    ((i32::from(value) * max + 128) / 255).clamp(0, max)
}

/// Read a decimal number from a sysfs attribute.
fn read_number(path: &Path) -> Option<i32> {
    match fs::read_to_string(path) {
        Ok(text) => text.trim().parse().ok(),
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), %err, "failed to read led attribute");
            }
            None
        }
    }
}

/// Open a sysfs attribute for append-mode writing.
fn open_attr(path: &Path) -> Option<File> {
    match OpenOptions::new().append(true).open(path) {
        Ok(file) => Some(file),
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), %err, "failed to open led attribute");
            }
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
