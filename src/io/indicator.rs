//! Indicator strip rendering
//!
//! Maps each cycle's signals onto a strip of RGB pixels:
//! - Pass-by with movement: cyan blink over the whole strip
//! - Alert armed: steady red fill, otherwise dark
//! - Vehicle stationary at the alert point: yellow middle half
//! - Tracked vehicles: magenta blink on the last quarter, once per vehicle
//! - Feed failure: steady dim blue
//!
//! Brightness scaling is applied to every frame before it reaches the sink.

use crate::domain::types::GlobalSignals;
use crate::infra::config::Config;
use crate::infra::error::DeviceError;
use async_trait::async_trait;
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Multiply every channel by `factor` (0 ... 1), truncating
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |c: u8| (f64::from(c) * factor) as u8;
        Rgb(scale(self.0), scale(self.1), scale(self.2))
    }
}

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const RED: Rgb = Rgb(255, 0, 0);
pub const YELLOW: Rgb = Rgb(255, 255, 0);
pub const CYAN: Rgb = Rgb(0, 255, 255);
pub const MAGENTA: Rgb = Rgb(255, 0, 255);
pub const FAILURE_BLUE: Rgb = Rgb(0, 0, 100);

/// Blink repeats for the pass-by signal
const PASSBY_BLINKS: usize = 10;

/// Startup sweep step delay
const SWEEP_STEP: Duration = Duration::from_millis(100);

/// Receives finished frames, one color per pixel
#[async_trait]
pub trait PixelSink: Send {
    async fn show(&mut self, frame: &[Rgb]) -> Result<(), DeviceError>;
}

/// Rendering side of the poll loop
#[async_trait]
pub trait Indicator: Send {
    /// Show one cycle's signals
    async fn render(&mut self, signals: &GlobalSignals, alert_armed: bool)
        -> Result<(), DeviceError>;

    /// Show that the feed could not be read
    async fn render_failure(&mut self) -> Result<(), DeviceError>;
}

/// Sink that only logs frames, for running without a strip attached
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self { frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[async_trait]
impl PixelSink for LogSink {
    async fn show(&mut self, frame: &[Rgb]) -> Result<(), DeviceError> {
        self.frames += 1;
        trace!(pixels = %frame.len(), first = ?frame.first(), "frame_shown");
        Ok(())
    }
}

/// Renders signals as pixel frames on a sink
pub struct StripIndicator<S: PixelSink> {
    sink: S,
    brightness: f64,
    blink_interval: Duration,
    /// Steady frame, restored after every blink sequence
    base: Vec<Rgb>,
}

impl<S: PixelSink> StripIndicator<S> {
    pub fn new(sink: S, config: &Config) -> Self {
        Self::with_settings(
            sink,
            config.pixel_count(),
            config.brightness(),
            Duration::from_millis(config.blink_interval_ms()),
        )
    }

    pub fn with_settings(
        sink: S,
        pixel_count: usize,
        brightness: f64,
        blink_interval: Duration,
    ) -> Self {
        Self {
            sink,
            brightness: brightness.clamp(0.0, 1.0),
            blink_interval,
            base: vec![BLACK; pixel_count],
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn pixel_count(&self) -> usize {
        self.base.len()
    }

    /// Middle half of the strip, used for the stationary-at-alert highlight
    pub fn stationary_range(&self) -> Range<usize> {
        let n = self.pixel_count();
        n / 4..n * 3 / 4
    }

    /// Last quarter of the strip, used for the tracked-count blink
    pub fn tracked_range(&self) -> Range<usize> {
        let n = self.pixel_count();
        n * 3 / 4..n
    }

    /// Ramp the whole strip up in white to show the process is alive
    pub async fn startup_sweep(&mut self, steps: u8) -> Result<(), DeviceError> {
        for step in 0..steps {
            let level = step.saturating_mul(3);
            let frame = vec![Rgb(level, level, level); self.pixel_count()];
            self.emit(&frame).await?;
            tokio::time::sleep(SWEEP_STEP).await;
        }
        self.base.fill(BLACK);
        let base = self.base.clone();
        self.emit(&base).await
    }

    async fn emit(&mut self, frame: &[Rgb]) -> Result<(), DeviceError> {
        let brightness = self.brightness;
        let scaled: Vec<Rgb> = frame.iter().map(|c| c.scaled(brightness)).collect();
        self.sink.show(&scaled).await
    }

    /// Alternate `color` over `range` with the base frame, then restore the base
    pub async fn blink(
        &mut self,
        range: Range<usize>,
        count: usize,
        color: Rgb,
    ) -> Result<(), DeviceError> {
        let end = range.end.min(self.pixel_count());
        let start = range.start.min(end);

        let mut overlay = self.base.clone();
        overlay[start..end].fill(color);
        let base = self.base.clone();

        for i in 0..=count {
            let frame = if i % 2 == 0 { &overlay } else { &base };
            self.emit(frame).await?;
            if !self.blink_interval.is_zero() {
                tokio::time::sleep(self.blink_interval).await;
            }
        }

        self.emit(&base).await
    }

    /// Compose the steady frame for this cycle
    fn compose_base(&mut self, signals: &GlobalSignals, alert_armed: bool) {
        self.base.fill(if alert_armed { RED } else { BLACK });
        if signals.alert_and_not_moving {
            let range = self.stationary_range();
            self.base[range].fill(YELLOW);
        }
    }
}

#[async_trait]
impl<S: PixelSink> Indicator for StripIndicator<S> {
    async fn render(
        &mut self,
        signals: &GlobalSignals,
        alert_armed: bool,
    ) -> Result<(), DeviceError> {
        if signals.passby_and_moving {
            let all = 0..self.pixel_count();
            self.blink(all, PASSBY_BLINKS, CYAN).await?;
        }

        self.compose_base(signals, alert_armed);
        let base = self.base.clone();
        self.emit(&base).await?;

        if signals.tracked_count > 0 {
            let range = self.tracked_range();
            self.blink(range, signals.tracked_count, MAGENTA).await?;
        }

        debug!(
            alert_armed = %alert_armed,
            stationary = %signals.alert_and_not_moving,
            passby = %signals.passby_and_moving,
            tracked = %signals.tracked_count,
            "indicator_rendered"
        );
        Ok(())
    }

    async fn render_failure(&mut self) -> Result<(), DeviceError> {
        let frame = vec![FAILURE_BLUE; self.pixel_count()];
        self.emit(&frame).await
    }
}
