//! WAV Container Encoding
//!
//! Serializes an [`AudioBuffer`] into a canonical RIFF/WAVE file.
//!
//! **WAV Format**:
//! - 44-byte header, no optional chunks
//! - 16-bit signed little-endian PCM
//! - Frames interleaved channel by channel (frame 0: ch0, ch1, ...; frame 1: ...)
//!
//! **Sample conversion**: samples are clamped to [-1.0, 1.0], then negative values
//! are scaled by 32768 and non-negative values by 32767 and rounded. Consumers of
//! this container expect exactly that asymmetric mapping, so -1.0 becomes -32768
//! and 1.0 becomes 32767.

use std::fmt;
use std::path::Path;

use snafu::{ensure, OptionExt, ResultExt};

use crate::buffer::AudioBuffer;
use crate::error::{InvalidBufferSnafu, IoSnafu, Result};

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: usize = 2;

/// Content type of an encoded blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    /// Uncompressed RIFF/WAVE container
    Wav,
    /// MPEG layer III
    Mpeg,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Wav => "audio/wav",
            MimeType::Mpeg => "audio/mpeg",
        }
    }

    /// File extension used when the blob is saved
    pub fn extension(&self) -> &'static str {
        match self {
            MimeType::Wav => "wav",
            MimeType::Mpeg => "mp3",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded audio bytes tagged with their content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    mime: MimeType,
}

impl EncodedAudio {
    pub fn new(bytes: Vec<u8>, mime: MimeType) -> Self {
        Self { bytes, mime }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> MimeType {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the bytes to `path`, replacing any existing file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes).context(IoSnafu {
            path: path.display().to_string(),
        })
    }
}

/// Fields of the 44-byte PCM header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavHeader {
    channels: u16,
    sample_rate: u32,
    data_len: u32,
}

impl WavHeader {
    /// Header for `frames` frames of `channels` channels.
    ///
    /// Fails when a field does not fit its on-disk width.
    fn new(channels: usize, sample_rate: u32, frames: usize) -> Result<Self> {
        let channels = u16::try_from(channels)
            .ok()
            .filter(|c| c.checked_mul(BYTES_PER_SAMPLE as u16).is_some())
            .context(InvalidBufferSnafu {
                reason: format!("{} channels do not fit a WAV header", channels),
            })?;

        let data_len = frames
            .checked_mul(channels as usize * BYTES_PER_SAMPLE)
            .and_then(|len| u32::try_from(len).ok())
            .filter(|&len| len <= u32::MAX - 36)
            .context(InvalidBufferSnafu {
                reason: format!("{} frames exceed the 4 GiB WAV data limit", frames),
            })?;

        let header = Self {
            channels,
            sample_rate,
            data_len,
        };
        ensure!(
            sample_rate
                .checked_mul(header.block_align() as u32)
                .is_some(),
            InvalidBufferSnafu {
                reason: format!("byte rate overflows at {} Hz", sample_rate),
            }
        );
        Ok(header)
    }

    fn block_align(&self) -> u16 {
        self.channels * BYTES_PER_SAMPLE as u16
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Generate the 44-byte WAV header
    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        let riff_size = self.data_len + 36; // File size - 8 bytes

        // RIFF chunk descriptor
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&riff_size.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        // fmt sub-chunk
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes()); // Subchunk1Size (16 for PCM)
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // AudioFormat (1 = PCM)
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&16u16.to_le_bytes()); // BitsPerSample

        // data sub-chunk
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_len.to_le_bytes());

        header
    }

    /// Read back a header written by [`WavHeader::to_bytes`].
    fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..HEADER_LEN)?;
        let u16_at = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };

        let canonical = &header[0..4] == b"RIFF"
            && &header[8..12] == b"WAVE"
            && &header[12..16] == b"fmt "
            && u32_at(16) == 16
            && u16_at(20) == 1
            && u16_at(34) == 16
            && &header[36..40] == b"data";
        if !canonical {
            return None;
        }

        Some(Self {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            data_len: u32_at(40),
        })
    }
}

/// Convert a floating-point sample to 16-bit PCM.
///
/// Clamps to [-1.0, 1.0]; negatives scale by 32768, everything else by 32767.
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0).round() as i16
    } else {
        (clamped * 32767.0).round() as i16
    }
}

/// Inverse of [`f32_to_i16`]
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Encode a buffer as a canonical 16-bit PCM WAV container.
///
/// The result is always `44 + length * channels * 2` bytes.
///
/// # Errors
/// Returns [`crate::Error::InvalidBuffer`] when the channel count, byte rate or data
/// size does not fit the header's 16/32-bit fields.
///
/// # Example
/// ```
/// use beatmark::{encode_container, AudioBuffer, MimeType};
///
/// let buffer = AudioBuffer::silent(8000, 1, 100).unwrap();
/// let wav = encode_container(&buffer).unwrap();
/// assert_eq!(wav.len(), 244);
/// assert_eq!(wav.mime(), MimeType::Wav);
/// ```
pub fn encode_container(buffer: &AudioBuffer) -> Result<EncodedAudio> {
    let channels = buffer.channels();
    let frames = buffer.length();
    let header = WavHeader::new(channels.len(), buffer.sample_rate(), frames)?;

    let mut wav_data = Vec::with_capacity(HEADER_LEN + header.data_len as usize);
    wav_data.extend_from_slice(&header.to_bytes());

    for frame in 0..frames {
        for channel in channels {
            wav_data.extend_from_slice(&f32_to_i16(channel[frame]).to_le_bytes());
        }
    }

    Ok(EncodedAudio::new(wav_data, MimeType::Wav))
}

/// Decode a container produced by [`encode_container`] back into a buffer.
///
/// Only the canonical 44-byte layout is accepted; general WAV files go through
/// [`crate::decode::WavDecoder`].
pub fn parse_container(bytes: &[u8]) -> Result<AudioBuffer> {
    let header = WavHeader::parse(bytes).ok_or_else(|| {
        InvalidBufferSnafu {
            reason: "not a canonical 16-bit PCM WAV container",
        }
        .build()
    })?;
    ensure!(
        header.channels > 0,
        InvalidBufferSnafu {
            reason: "container declares zero channels",
        }
    );

    let payload = &bytes[HEADER_LEN..];
    let data_len = header.data_len as usize;
    ensure!(
        payload.len() >= data_len,
        InvalidBufferSnafu {
            reason: format!(
                "data chunk declares {} bytes but only {} are present",
                data_len,
                payload.len()
            ),
        }
    );

    let interleaved: Vec<f32> = payload[..data_len]
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    AudioBuffer::from_interleaved(header.sample_rate, header.channels as usize, &interleaved)
}

/// Encode `buffer` and write it to `path`.
pub fn write_wav_file<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<()> {
    encode_container(buffer)?.write_to(path)
}
