//! End-to-end watermarking pipeline
//!
//! decode main → decode watermark → mix → encode WAV → (optional) compress.
//!
//! Each call is independent. The result is either a complete [`Watermarked`] or
//! an error; nothing partially encoded is ever returned.

use std::path::Path;

use snafu::ResultExt;
use tracing::{info, instrument};

use crate::compress::{default_compressor, try_compress, Compressor};
use crate::decode::{SampleDecoder, SymphoniaDecoder};
use crate::error::{DecodeSnafu, IoSnafu, Result};
use crate::mixer::{mix, MixConfig};
use crate::wav::{encode_container, EncodedAudio, MimeType};

/// Prefix of every download name
pub const FILENAME_PREFIX: &str = "watermarked_";

/// Requested output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Always-available 16-bit PCM WAV
    #[default]
    Uncompressed,
    /// MP3, falling back to WAV when no encoder can produce it
    Compressed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub mix: MixConfig,
    pub output: OutputFormat,
    /// Target bitrate for compressed output
    pub mp3_bitrate_kbps: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mix: MixConfig::default(),
            output: OutputFormat::Uncompressed,
            mp3_bitrate_kbps: 128,
        }
    }
}

/// A finished watermarking run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermarked {
    pub audio: EncodedAudio,
    /// Non-fatal problem encountered along the way (compression fallback)
    pub warning: Option<String>,
}

impl Watermarked {
    /// Download name for this result given the main track's file name.
    pub fn filename(&self, main_name: &str) -> String {
        download_filename(main_name, self.audio.mime())
    }
}

/// `watermarked_<name>.<ext>` for the main track's file name.
///
/// The main file's name is kept whole, extension included, and the extension
/// matching `mime` is appended (`beat.mp3` gives `watermarked_beat.mp3.wav`).
/// Leading directories are dropped; an empty name falls back to `audio`.
pub fn download_filename(main_name: &str, mime: MimeType) -> String {
    let name = Path::new(main_name)
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("audio");
    format!("{}{}.{}", FILENAME_PREFIX, name, mime.extension())
}

/// Runs the full decode, mix, encode chain with pluggable collaborators.
pub struct Watermarker {
    decoder: Box<dyn SampleDecoder + Send + Sync>,
    compressor: Box<dyn Compressor + Send + Sync>,
    config: PipelineConfig,
}

impl Watermarker {
    /// Symphonia decoding and the compressor this build ships with.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            decoder: Box::new(SymphoniaDecoder::new()),
            compressor: default_compressor(config.mp3_bitrate_kbps),
            config,
        }
    }

    pub fn with_decoder<D>(mut self, decoder: D) -> Self
    where
        D: SampleDecoder + Send + Sync + 'static,
    {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn with_compressor<C>(mut self, compressor: C) -> Self
    where
        C: Compressor + Send + Sync + 'static,
    {
        self.compressor = Box::new(compressor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Watermark `main` with `watermark`, both given as encoded file bytes.
    #[instrument(skip_all, fields(
        main_bytes = main.len(),
        watermark_bytes = watermark.len(),
        output = ?self.config.output
    ))]
    pub fn process(&self, main: &[u8], watermark: &[u8]) -> Result<Watermarked> {
        self.config.mix.validate()?;

        let main = self.decoder.decode(main).context(DecodeSnafu { input: "main" })?;
        let watermark = self
            .decoder
            .decode(watermark)
            .context(DecodeSnafu { input: "watermark" })?;

        let mixed = mix(&main, &watermark, &self.config.mix)?;
        let container = encode_container(&mixed)?;

        let result = match self.config.output {
            OutputFormat::Uncompressed => Watermarked {
                audio: container,
                warning: None,
            },
            OutputFormat::Compressed => {
                let outcome = try_compress(self.compressor.as_ref(), container);
                Watermarked {
                    audio: outcome.audio,
                    warning: outcome.warning,
                }
            }
        };

        info!(
            sample_rate = mixed.sample_rate(),
            channels = mixed.number_of_channels(),
            duration = mixed.duration(),
            bytes = result.audio.len(),
            mime = %result.audio.mime(),
            "Watermark applied"
        );

        Ok(result)
    }

    /// Read both inputs from disk and run [`Watermarker::process`].
    pub fn process_files<P, Q>(&self, main: P, watermark: Q) -> Result<Watermarked>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let main = read_file(main.as_ref())?;
        let watermark = read_file(watermark.as_ref())?;
        self.process(&main, &watermark)
    }
}

impl Default for Watermarker {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).context(IoSnafu {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::compress::{CompressError, UnavailableCompressor};
    use crate::decode::{DecodeError, WavDecoder};
    use crate::tracing_init::init_test_tracing;
    use crate::Error;

    /// Decoder that ignores the bytes and hands out a fixed buffer per input
    struct FakeDecoder {
        main: AudioBuffer,
        watermark: AudioBuffer,
    }

    impl SampleDecoder for FakeDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
            match bytes {
                b"main" => Ok(self.main.clone()),
                b"watermark" => Ok(self.watermark.clone()),
                _ => Err(DecodeError::UnsupportedFormat {
                    message: "unknown fixture".to_string(),
                }),
            }
        }
    }

    struct TagCompressor;

    impl Compressor for TagCompressor {
        fn compress(&self, container: &EncodedAudio) -> Result<EncodedAudio, CompressError> {
            Ok(EncodedAudio::new(container.bytes()[..4].to_vec(), MimeType::Mpeg))
        }
    }

    fn fake() -> FakeDecoder {
        FakeDecoder {
            main: AudioBuffer::silent(1000, 2, 3500).unwrap(),
            watermark: AudioBuffer::new(1000, vec![vec![0.5; 50]]).unwrap(),
        }
    }

    fn config(output: OutputFormat) -> PipelineConfig {
        PipelineConfig {
            mix: MixConfig::new(1.0, 100.0),
            output,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename("beat.mp3", MimeType::Wav), "watermarked_beat.mp3.wav");
        assert_eq!(download_filename("beat.wav", MimeType::Mpeg), "watermarked_beat.wav.mp3");
        assert_eq!(download_filename("beat", MimeType::Wav), "watermarked_beat.wav");
        assert_eq!(
            download_filename("uploads/my.final.beat.flac", MimeType::Wav),
            "watermarked_my.final.beat.flac.wav"
        );
        assert_eq!(download_filename("", MimeType::Wav), "watermarked_audio.wav");
    }

    #[test]
    fn test_uncompressed_pipeline() {
        init_test_tracing();

        let watermarker = Watermarker::new(config(OutputFormat::Uncompressed)).with_decoder(fake());
        let result = watermarker.process(b"main", b"watermark").unwrap();

        assert_eq!(result.audio.mime(), MimeType::Wav);
        assert_eq!(result.audio.len(), 44 + 3500 * 2 * 2);
        assert!(result.warning.is_none());
        assert_eq!(result.filename("track.ogg"), "watermarked_track.ogg.wav");

        let decoded = WavDecoder.decode(result.audio.bytes()).unwrap();
        let left = decoded.channel(0).unwrap();
        let right = decoded.channel(1).unwrap();
        for start in [0, 1000, 2000, 3000] {
            assert!((left[start] - 0.5).abs() < 1e-4);
        }
        assert_eq!(left[50], 0.0);
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_compressed_pipeline_uses_compressor() {
        let watermarker = Watermarker::new(config(OutputFormat::Compressed))
            .with_decoder(fake())
            .with_compressor(TagCompressor);
        let result = watermarker.process(b"main", b"watermark").unwrap();

        assert_eq!(result.audio.mime(), MimeType::Mpeg);
        assert_eq!(result.audio.bytes(), b"RIFF");
        assert_eq!(result.filename("track.wav"), "watermarked_track.wav.mp3");
    }

    #[test]
    fn test_compressed_pipeline_falls_back() {
        init_test_tracing();

        let watermarker = Watermarker::new(config(OutputFormat::Compressed))
            .with_decoder(fake())
            .with_compressor(UnavailableCompressor);
        let result = watermarker.process(b"main", b"watermark").unwrap();

        assert_eq!(result.audio.mime(), MimeType::Wav);
        assert_eq!(result.audio.len(), 44 + 3500 * 2 * 2);
        assert!(result.warning.is_some());
        assert_eq!(result.filename("track.wav"), "watermarked_track.wav.wav");
    }

    #[test]
    fn test_decode_failure_names_input() {
        let watermarker = Watermarker::default().with_decoder(fake());
        let err = watermarker.process(b"main", b"garbage").unwrap_err();

        assert!(matches!(err, Error::Decode { input: "watermark", .. }));
    }

    #[test]
    fn test_invalid_interval_fails_before_decoding() {
        let mut cfg = config(OutputFormat::Uncompressed);
        cfg.mix.interval_seconds = 0.0;

        // Undecodable inputs: the config error must win
        let err = Watermarker::new(cfg)
            .with_decoder(fake())
            .process(b"x", b"y")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_unencodable_buffer_is_an_error() {
        let decoder = FakeDecoder {
            main: AudioBuffer::silent(u32::MAX, 2, 4).unwrap(),
            watermark: AudioBuffer::silent(u32::MAX, 1, 2).unwrap(),
        };
        let err = Watermarker::new(config(OutputFormat::Uncompressed))
            .with_decoder(decoder)
            .process(b"main", b"watermark")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuffer { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Watermarker::default()
            .process_files("/nonexistent/beatmark/main.wav", "/nonexistent/tag.wav")
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
