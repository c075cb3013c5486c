//! Optional lossy compression of the WAV container
//!
//! Compression never fails the pipeline: [`try_compress`] falls back to the
//! uncompressed container and reports why in [`CompressOutcome::warning`].

use snafu::Snafu;
use tracing::{info, warn};

use crate::wav::EncodedAudio;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompressError {
    /// No encoder is available in this build or environment
    #[snafu(display("compression unavailable: {reason}"))]
    CompressionUnavailable { reason: String },

    /// The encoder rejected the input or failed mid-stream
    #[snafu(display("compression failed: {message}"))]
    CompressionFailed { message: String },
}

/// Turns an uncompressed WAV container into a compressed encoding.
pub trait Compressor {
    fn compress(&self, container: &EncodedAudio) -> Result<EncodedAudio, CompressError>;
}

/// Compressor used when no codec is compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCompressor;

impl Compressor for UnavailableCompressor {
    fn compress(&self, _container: &EncodedAudio) -> Result<EncodedAudio, CompressError> {
        CompressionUnavailableSnafu {
            reason: "built without an MP3 encoder",
        }
        .fail()
    }
}

/// Result of a compression attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOutcome {
    pub audio: EncodedAudio,
    /// Set when compression was skipped and `audio` is the original container
    pub warning: Option<String>,
}

impl CompressOutcome {
    pub fn fell_back(&self) -> bool {
        self.warning.is_some()
    }
}

/// Compress `container`, or return it unchanged with a warning if that fails.
pub fn try_compress<C>(compressor: &C, container: EncodedAudio) -> CompressOutcome
where
    C: Compressor + ?Sized,
{
    match compressor.compress(&container) {
        Ok(audio) => {
            info!(
                from = container.len(),
                to = audio.len(),
                mime = %audio.mime(),
                "Compressed container"
            );
            CompressOutcome {
                audio,
                warning: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "Compression failed, keeping uncompressed output");
            CompressOutcome {
                audio: container,
                warning: Some(e.to_string()),
            }
        }
    }
}

/// The compressor this build ships with.
pub fn default_compressor(bitrate_kbps: u32) -> Box<dyn Compressor + Send + Sync> {
    #[cfg(feature = "mp3")]
    {
        Box::new(mp3::LameCompressor::new(bitrate_kbps))
    }
    #[cfg(not(feature = "mp3"))]
    {
        let _ = bitrate_kbps;
        Box::new(UnavailableCompressor)
    }
}

#[cfg(feature = "mp3")]
pub use mp3::LameCompressor;

#[cfg(feature = "mp3")]
mod mp3 {
    use std::mem::MaybeUninit;

    use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
    use tracing::debug;

    use super::{CompressError, Compressor};
    use crate::wav::{f32_to_i16, parse_container, EncodedAudio, MimeType};

    /// MP3 encoder backed by LAME
    ///
    /// Re-reads the WAV container it is given, so it accepts exactly what
    /// [`crate::encode_container`] produces. Mono and stereo only.
    #[derive(Debug, Clone, Copy)]
    pub struct LameCompressor {
        bitrate_kbps: u32,
    }

    impl Default for LameCompressor {
        fn default() -> Self {
            Self { bitrate_kbps: 128 }
        }
    }

    impl LameCompressor {
        pub fn new(bitrate_kbps: u32) -> Self {
            Self { bitrate_kbps }
        }

        fn bitrate(&self) -> Bitrate {
            match self.bitrate_kbps {
                0..=96 => Bitrate::Kbps96,
                97..=112 => Bitrate::Kbps112,
                113..=128 => Bitrate::Kbps128,
                129..=160 => Bitrate::Kbps160,
                161..=192 => Bitrate::Kbps192,
                193..=224 => Bitrate::Kbps224,
                225..=256 => Bitrate::Kbps256,
                _ => Bitrate::Kbps320,
            }
        }
    }

    fn failed(message: impl Into<String>) -> CompressError {
        CompressError::CompressionFailed {
            message: message.into(),
        }
    }

    impl Compressor for LameCompressor {
        fn compress(&self, container: &EncodedAudio) -> Result<EncodedAudio, CompressError> {
            if container.mime() != MimeType::Wav {
                return Err(failed(format!("expected audio/wav input, got {}", container.mime())));
            }

            let buffer =
                parse_container(container.bytes()).map_err(|e| failed(e.to_string()))?;
            let num_channels = buffer.number_of_channels();
            if num_channels == 0 || num_channels > 2 {
                return Err(failed(format!(
                    "MP3 supports 1 or 2 channels, got {}",
                    num_channels
                )));
            }

            let mut builder = Builder::new().ok_or_else(|| {
                CompressError::CompressionUnavailable {
                    reason: "failed to create LAME encoder".to_string(),
                }
            })?;
            builder
                .set_sample_rate(buffer.sample_rate())
                .map_err(|e| failed(format!("invalid sample rate: {:?}", e)))?;
            builder
                .set_num_channels(num_channels as u8)
                .map_err(|e| failed(format!("invalid channel count: {:?}", e)))?;
            builder
                .set_brate(self.bitrate())
                .map_err(|e| failed(format!("invalid bitrate: {:?}", e)))?;
            builder
                .set_quality(Quality::Best)
                .map_err(|e| failed(format!("invalid quality: {:?}", e)))?;

            let mut encoder = builder
                .build()
                .map_err(|e| failed(format!("failed to build encoder: {:?}", e)))?;

            let frames = buffer.length();
            let mut interleaved = Vec::with_capacity(frames * num_channels);
            for frame in 0..frames {
                for channel in buffer.channels() {
                    interleaved.push(f32_to_i16(channel[frame]));
                }
            }

            // LAME worst case: 1.25 * samples + 7200
            let max_output_size = (frames as f64 * 1.25) as usize + 7200;
            let mut mp3_buffer: Vec<MaybeUninit<u8>> = vec![MaybeUninit::uninit(); max_output_size];

            // Interleaved input is always read as L/R pairs
            let encoded = if num_channels == 1 {
                encoder.encode(MonoPcm(&interleaved), &mut mp3_buffer)
            } else {
                encoder.encode(InterleavedPcm(&interleaved), &mut mp3_buffer)
            };
            let encoded_size =
                encoded.map_err(|e| failed(format!("MP3 encoding failed: {:?}", e)))?;
            let flush_size = encoder
                .flush::<FlushNoGap>(&mut mp3_buffer[encoded_size..])
                .map_err(|e| failed(format!("MP3 flush failed: {:?}", e)))?;
            let total_size = encoded_size + flush_size;

            // SAFETY: the encoder initialised the first `total_size` bytes.
            let mp3_bytes: Vec<u8> = mp3_buffer[..total_size]
                .iter()
                .map(|b| unsafe { b.assume_init() })
                .collect();

            debug!(
                bitrate_kbps = self.bitrate_kbps,
                channels = num_channels,
                sample_rate = buffer.sample_rate(),
                bytes = total_size,
                "Encoded MP3"
            );

            Ok(EncodedAudio::new(mp3_bytes, MimeType::Mpeg))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::buffer::AudioBuffer;
        use crate::wav::encode_container;

        #[test]
        fn test_bitrate_buckets() {
            assert!(matches!(LameCompressor::new(64).bitrate(), Bitrate::Kbps96));
            assert!(matches!(LameCompressor::default().bitrate(), Bitrate::Kbps128));
            assert!(matches!(LameCompressor::new(500).bitrate(), Bitrate::Kbps320));
        }

        #[test]
        fn test_rejects_non_wav_input() {
            let input = EncodedAudio::new(vec![0xFF, 0xFB, 0x90], MimeType::Mpeg);
            let result = LameCompressor::default().compress(&input);
            assert!(matches!(result, Err(CompressError::CompressionFailed { .. })));
        }

        #[test]
        fn test_rejects_surround() {
            let buffer = AudioBuffer::silent(44100, 6, 1152).unwrap();
            let result = LameCompressor::default().compress(&encode_container(&buffer).unwrap());
            assert!(matches!(result, Err(CompressError::CompressionFailed { .. })));
        }
    }
}
