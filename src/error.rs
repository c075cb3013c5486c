use snafu::Snafu;

use crate::decode::DecodeError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Watermark interval does not advance the overlay schedule
    #[snafu(display("interval_seconds must be a positive finite number, got {interval_seconds}"))]
    InvalidConfig { interval_seconds: f64 },

    /// Buffer construction rejected the channel data
    #[snafu(display("invalid audio buffer: {reason}"))]
    InvalidBuffer { reason: String },

    /// Input bytes could not be decoded
    #[snafu(display("failed to decode {input} audio"))]
    Decode { input: &'static str, source: DecodeError },

    /// Reading or writing a file failed
    #[snafu(display("I/O error on '{path}'"))]
    Io { path: String, source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
