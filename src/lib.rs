pub mod buffer;
pub mod compress;
pub mod decode;
pub mod error;
pub mod mixer;
pub mod pipeline;
pub mod tracing_init;
pub mod wav;

pub use buffer::AudioBuffer;
pub use compress::{try_compress, CompressError, CompressOutcome, Compressor};
pub use decode::{DecodeError, SampleDecoder, SymphoniaDecoder, WavDecoder};
pub use error::{Error, Result};
pub use mixer::{mix, MixConfig};
pub use pipeline::{download_filename, OutputFormat, PipelineConfig, Watermarked, Watermarker};
pub use wav::{encode_container, EncodedAudio, MimeType};
