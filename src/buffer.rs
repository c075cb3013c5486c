//! Decoded audio held as one sample vector per channel
//!
//! Samples are `f32` values nominally in [-1.0, 1.0]. Every channel holds the
//! same number of samples; the constructors refuse anything else.

use snafu::ensure;

use crate::error::{InvalidBufferSnafu, Result};

/// In-memory multi-channel audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    length: usize,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from per-channel sample vectors.
    ///
    /// Fails when `sample_rate` is zero or when the channels differ in length.
    /// An empty channel list is accepted and yields a zero-length buffer.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        ensure!(
            sample_rate > 0,
            InvalidBufferSnafu {
                reason: "sample rate must be positive",
            }
        );

        let length = channels.first().map_or(0, Vec::len);
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != length)
        {
            return InvalidBufferSnafu {
                reason: format!(
                    "channel {} has {} samples, expected {}",
                    index,
                    channel.len(),
                    length
                ),
            }
            .fail();
        }

        Ok(Self {
            sample_rate,
            length,
            channels,
        })
    }

    /// All-zero buffer with the given shape
    pub fn silent(sample_rate: u32, number_of_channels: usize, length: usize) -> Result<Self> {
        Self::new(sample_rate, vec![vec![0.0; length]; number_of_channels])
    }

    /// Split frame-interleaved samples (ch0, ch1, ..., ch0, ch1, ...) into channels.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        sample_rate: u32,
        number_of_channels: usize,
        interleaved: &[f32],
    ) -> Result<Self> {
        ensure!(
            number_of_channels > 0,
            InvalidBufferSnafu {
                reason: "interleaved audio needs at least one channel",
            }
        );

        let frames = interleaved.len() / number_of_channels;
        let mut channels = vec![Vec::with_capacity(frames); number_of_channels];
        for frame in interleaved.chunks_exact(number_of_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0 || self.channels.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.length as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Hand the channel vectors to a stage that builds a new buffer from them.
    ///
    /// Callers must put back channels of the original length; see [`AudioBuffer::new`].
    pub(crate) fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reports_shape() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.1; 441], vec![0.2; 441]]).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.length(), 441);
        assert!((buffer.duration() - 0.01).abs() < 1e-12);
        assert_eq!(buffer.channel(1).unwrap()[0], 0.2);
        assert!(buffer.channel(2).is_none());
    }

    #[test]
    fn test_new_rejects_ragged_channels() {
        let result = AudioBuffer::new(8000, vec![vec![0.0; 10], vec![0.0; 9]]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("channel 1 has 9 samples, expected 10"));
    }

    #[test]
    fn test_new_rejects_zero_sample_rate() {
        assert!(AudioBuffer::new(0, vec![vec![0.0; 4]]).is_err());
    }

    #[test]
    fn test_zero_channels_is_empty() {
        let buffer = AudioBuffer::new(8000, Vec::new()).unwrap();
        assert_eq!(buffer.length(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), 0.0);
    }

    #[test]
    fn test_from_interleaved_splits_frames() {
        let interleaved = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3, 0.4];
        let buffer = AudioBuffer::from_interleaved(1000, 2, &interleaved).unwrap();

        assert_eq!(buffer.length(), 3);
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.1, -0.2, -0.3]);
    }

    #[test]
    fn test_silent_buffer() {
        let buffer = AudioBuffer::silent(22050, 2, 100).unwrap();
        assert!(buffer
            .channels()
            .iter()
            .all(|c| c.len() == 100 && c.iter().all(|&s| s == 0.0)));
    }
}
