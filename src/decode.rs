//! Audio decoding collaborators
//!
//! The mixer only consumes [`AudioBuffer`]s; turning file bytes into one is the
//! job of a [`SampleDecoder`]. Two implementations are provided:
//!
//! - [`SymphoniaDecoder`]: probes the bytes and decodes any format Symphonia
//!   was built with (WAV, FLAC, Ogg/Vorbis, MP3, AAC/MP4).
//! - [`WavDecoder`]: WAV only, through `hound`.

use std::io::Cursor;

use snafu::{ResultExt, Snafu};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

use crate::buffer::AudioBuffer;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// Bytes are not in a recognised audio format
    #[snafu(display("unsupported audio format: {message}"))]
    UnsupportedFormat { message: String },

    /// Container has no decodable audio track
    #[snafu(display("no audio track found"))]
    NoAudioTrack,

    /// Track does not declare a sample rate or channel layout
    #[snafu(display("audio track is missing {what}"))]
    MissingParameter { what: &'static str },

    /// Stream is damaged beyond recovery
    #[snafu(display("corrupt audio stream: {message}"))]
    Corrupt { message: String },

    /// WAV reader failure
    #[snafu(display("failed to read WAV data"))]
    Wav { source: hound::Error },

    /// Decoded samples do not form a valid buffer
    #[snafu(display("decoded audio has an invalid layout: {message}"))]
    Layout { message: String },
}

/// Turns encoded audio bytes into an [`AudioBuffer`].
pub trait SampleDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError>;
}

fn into_buffer(
    sample_rate: u32,
    channels: usize,
    interleaved: &[f32],
) -> Result<AudioBuffer, DecodeError> {
    AudioBuffer::from_interleaved(sample_rate, channels, interleaved).map_err(|e| {
        DecodeError::Layout {
            message: e.to_string(),
        }
    })
}

/// General-purpose decoder backed by Symphonia
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that passes a file extension to the format probe.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }
}

impl SampleDecoder for SymphoniaDecoder {
    #[instrument(skip_all, fields(bytes = bytes.len(), extension = ?self.extension))]
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let source = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                message: e.to_string(),
            })?;
        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut sample_rate = codec_params.sample_rate;
        let mut channels = codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                message: e.to_string(),
            })?;

        let mut interleaved: Vec<f32> = Vec::new();

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(DecodeError::Corrupt {
                        message: e.to_string(),
                    })
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(error = %msg, "Skipping corrupted audio packet");
                    continue;
                }
                Err(e) => {
                    return Err(DecodeError::Corrupt {
                        message: e.to_string(),
                    })
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            sample_rate = sample_rate.or(Some(spec.rate));
            channels = channels.or(Some(spec.channels.count()));

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        let sample_rate = sample_rate.ok_or(DecodeError::MissingParameter {
            what: "a sample rate",
        })?;
        let channels = channels
            .filter(|&c| c > 0)
            .ok_or(DecodeError::MissingParameter {
                what: "a channel layout",
            })?;

        let buffer = into_buffer(sample_rate, channels, &interleaved)?;
        debug!(
            sample_rate,
            channels,
            length = buffer.length(),
            "Decoded audio"
        );
        Ok(buffer)
    }
}

/// WAV-only decoder backed by `hound`
///
/// Integer samples are normalised by `2^(bits - 1)`; float samples pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl SampleDecoder for WavDecoder {
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let reader = hound::WavReader::new(Cursor::new(bytes)).context(WavSnafu)?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(DecodeError::UnsupportedFormat {
                        message: format!("{}-bit integer WAV", spec.bits_per_sample),
                    });
                }
                let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context(WavSnafu)?
            }
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .context(WavSnafu)?,
        };

        let buffer = into_buffer(spec.sample_rate, spec.channels as usize, &interleaved)?;
        debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            length = buffer.length(),
            "Decoded WAV"
        );
        Ok(buffer)
    }
}
