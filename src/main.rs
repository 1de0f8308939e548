//! Indicator LED control CLI.
//!
//! Probes the sysfs LED backends, applies one pattern, and holds it until
//! a timeout elapses or Ctrl-C arrives, then blanks the LED and releases
//! the hardware. Mostly useful for poking at real hardware and for
//! demonstrating the controller's lifecycle.
//!
//! ## Usage
//! ```sh
//! led-indicator-rs --color ff0000 --on-ms 500 --off-ms 500 --breathe
//! ```

use clap::Parser;
use led_indicator_rs::{IndicatorConfig, IndicatorLed};
use std::path::PathBuf;
use std::time::Duration;

/// Sysfs RGB indicator LED controller
#[derive(Parser)]
#[command(name = "led-indicator-rs")]
#[command(about = "Drive a sysfs RGB indicator LED: static color, blink, or breathing")]
#[command(version)]
struct Args {
    /// Root directory of the kernel LED class devices
    #[arg(long, default_value = led_indicator_rs::DEFAULT_LEDS_ROOT)]
    leds_root: PathBuf,

    /// Color as six hex digits, e.g. ff8800
    #[arg(long, default_value = "ffffff", value_parser = parse_hex_color)]
    color: (u8, u8, u8),

    /// Milliseconds on per blink cycle (0 disables blinking)
    #[arg(long, default_value = "0")]
    on_ms: i32,

    /// Milliseconds off per blink cycle (0 disables blinking)
    #[arg(long, default_value = "0")]
    off_ms: i32,

    /// Render the blink cycle as a smooth breathing pulse
    #[arg(long)]
    breathe: bool,

    /// Brightness level, 1-255
    #[arg(long, default_value = "255")]
    brightness: i32,

    /// Hold the pattern this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    hold_secs: Option<u64>,
}

fn parse_hex_color(s: &str) -> Result<(u8, u8, u8), String> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if s.len() != 6 {
        return Err(format!("expected six hex digits, got {s:?}"));
    }
    let channel = |range| {
        u8::from_str_radix(&s[range], 16).map_err(|_| format!("invalid hex color {s:?}"))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing subscriber for controller logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let (r, g, b) = args.color;

    tracing::info!("led-indicator-rs v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("LEDs root: {}", args.leds_root.display());

    let mut led = IndicatorLed::init(IndicatorConfig {
        leds_root: args.leds_root,
        fallback: None,
    });
    if !led.available() {
        tracing::error!("no sysfs LED backend found; nothing to drive");
        std::process::exit(1);
    }

    led.set_brightness(args.brightness).await;
    led.enable_breathing(args.breathe).await;
    led.set_pattern(
        i32::from(r),
        i32::from(g),
        i32::from(b),
        args.on_ms,
        args.off_ms,
    )
    .await;

    if let Some(status) = led.status().await {
        match serde_json::to_string_pretty(&status) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::warn!(%err, "could not serialize status"),
        }
    }

    match args.hold_secs {
        Some(secs) => {
            tracing::info!("holding pattern for {secs}s");
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            }
        }
        None => {
            tracing::info!("holding pattern until Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
        }
    }

    led.quit().await;
    tracing::info!("indicator released");
}
