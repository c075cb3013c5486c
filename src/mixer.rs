//! Watermark Mixing
//!
//! Overlays a short watermark clip onto a main track at a fixed interval.
//!
//! **Schedule**: overlays start at t = 0, interval, 2 * interval, ... for as long
//! as t is strictly less than the main track's duration. Each start time maps to
//! `floor(t * sample_rate)` samples.
//!
//! **Clipping**: every addition is hard-clamped to [-1.0, 1.0] before the next
//! overlay is applied. Overlapping overlays therefore combine through the clamped
//! intermediate, and a sample that clipped on an earlier overlay is not recovered
//! by the raw sum of later ones.

use rayon::prelude::*;
use snafu::ensure;
use tracing::{debug, instrument};

use crate::buffer::AudioBuffer;
use crate::error::{InvalidConfigSnafu, Result};

/// Watermark placement settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixConfig {
    /// Seconds between the starts of consecutive overlays
    pub interval_seconds: f64,
    /// Watermark gain in percent (100 = unchanged)
    pub volume_percent: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 12.0,
            volume_percent: 75.0,
        }
    }
}

impl MixConfig {
    pub fn new(interval_seconds: f64, volume_percent: f64) -> Self {
        Self {
            interval_seconds,
            volume_percent,
        }
    }

    /// Linear multiplier applied to watermark samples
    pub fn gain(&self) -> f64 {
        self.volume_percent / 100.0
    }

    /// Reject intervals that would never advance the schedule.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.interval_seconds.is_finite() && self.interval_seconds > 0.0,
            InvalidConfigSnafu {
                interval_seconds: self.interval_seconds,
            }
        );
        Ok(())
    }
}

/// Watermark channel that feeds output channel `output_channel`.
///
/// Output channels past the watermark's last channel reuse that last channel, so a
/// mono watermark is broadcast to every output channel it is applied to.
/// `watermark_channels` must be non-zero.
pub fn watermark_channel(output_channel: usize, watermark_channels: usize) -> usize {
    debug_assert!(watermark_channels > 0);
    output_channel.min(watermark_channels - 1)
}

/// Start offsets (in samples) of every overlay on a track of `length` samples.
///
/// Offsets are yielded lazily in the order overlays are applied. Intervals
/// shorter than one sample repeat the same offset.
pub fn overlay_starts(length: usize, sample_rate: u32, config: &MixConfig) -> Result<OverlayStarts> {
    config.validate()?;

    let rate = sample_rate as f64;
    Ok(OverlayStarts {
        rate,
        duration: length as f64 / rate,
        interval: config.interval_seconds,
        current_time: 0.0,
    })
}

/// Iterator returned by [`overlay_starts`]
#[derive(Debug, Clone)]
pub struct OverlayStarts {
    rate: f64,
    duration: f64,
    interval: f64,
    current_time: f64,
}

impl Iterator for OverlayStarts {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.current_time >= self.duration {
            return None;
        }
        let start = (self.current_time * self.rate).floor() as usize;
        self.current_time += self.interval;
        Some(start)
    }
}

impl std::iter::FusedIterator for OverlayStarts {}

/// Add `watermark * gain` into `output` at `start`, clamping after each addition.
fn overlay(output: &mut [f32], watermark: &[f32], start: usize, gain: f64) {
    let Some(target) = output.get_mut(start..) else {
        return;
    };

    for (out, &wm) in target.iter_mut().zip(watermark) {
        let mixed = *out as f64 + wm as f64 * gain;
        *out = mixed.clamp(-1.0, 1.0) as f32;
    }
}

/// Mix `watermark` into a copy of `main` according to `config`.
///
/// The result has `main`'s sample rate, channel count, and length. Only the first
/// `min(main channels, watermark channels)` channels receive the watermark; see
/// [`watermark_channel`] for the channel mapping.
///
/// # Errors
/// Returns [`crate::Error::InvalidConfig`] for a non-positive or non-finite interval.
///
/// # Example
/// ```
/// use beatmark::{mix, AudioBuffer, MixConfig};
///
/// let main = AudioBuffer::silent(1000, 1, 3000).unwrap();
/// let tag = AudioBuffer::new(1000, vec![vec![0.5; 10]]).unwrap();
/// let out = mix(&main, &tag, &MixConfig::new(1.0, 100.0)).unwrap();
/// assert_eq!(out.channel(0).unwrap()[1000], 0.5);
/// ```
#[instrument(skip_all, fields(
    main_len = main.length(),
    watermark_len = watermark.length(),
    interval = config.interval_seconds,
    volume = config.volume_percent
))]
pub fn mix(main: &AudioBuffer, watermark: &AudioBuffer, config: &MixConfig) -> Result<AudioBuffer> {
    let starts = overlay_starts(main.length(), main.sample_rate(), config)?;
    let gain = config.gain();

    let watermark_channels = watermark.number_of_channels();
    let mixed_channels = main.number_of_channels().min(watermark_channels);

    if watermark.length() > 0 && config.interval_seconds < watermark.duration() {
        debug!(
            watermark_duration = watermark.duration(),
            "Interval is shorter than the watermark, overlays will overlap"
        );
    }

    let mut channels = main.clone().into_channels();

    // Channels are independent; within a channel overlays run in schedule order.
    channels
        .par_iter_mut()
        .take(mixed_channels)
        .enumerate()
        .for_each(|(c, output)| {
            let source = watermark.channels()[watermark_channel(c, watermark_channels)].as_slice();
            for start in starts.clone() {
                overlay(output, source, start, gain);
            }
        });

    debug!(mixed_channels, "Watermark mixed");

    AudioBuffer::new(main.sample_rate(), channels)
}
