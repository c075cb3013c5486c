//! Beat Watermarker - stamp a short audio tag into a track at a fixed interval
//!
//! Usage:
//!   beatmark [OPTIONS] <main-audio> <watermark-audio> [output]
//!
//! Options:
//!   -i, --interval <sec>    Seconds between watermarks (default: 12)
//!   -v, --volume <percent>  Watermark volume in percent (default: 75)
//!   -f, --format <wav|mp3>  Output format (default: wav)
//!   -b, --bitrate <kbps>    MP3 bitrate (default: 128)
//!   -h, --help              Show this help message
//!
//! Without an explicit output path the result is written next to the main file
//! as `watermarked_<name>.<wav|mp3>`.

use std::path::{Path, PathBuf};

use beatmark::tracing_init::init_tracing;
use beatmark::{MixConfig, OutputFormat, PipelineConfig, Watermarker};
use tracing::warn;

struct CliConfig {
    main_path: PathBuf,
    watermark_path: PathBuf,
    output_path: Option<PathBuf>,
    pipeline: PipelineConfig,
}

impl CliConfig {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut mix = MixConfig::default();
        let mut output = OutputFormat::Uncompressed;
        let mut mp3_bitrate_kbps = PipelineConfig::default().mp3_bitrate_kbps;
        let mut positional = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-i" | "--interval" => {
                    i += 1;
                    let value = args.get(i).ok_or("Missing value for --interval")?;
                    mix.interval_seconds = value
                        .parse()
                        .map_err(|_| format!("Invalid interval value: {}", value))?;
                }
                "-v" | "--volume" => {
                    i += 1;
                    let value = args.get(i).ok_or("Missing value for --volume")?;
                    mix.volume_percent = value
                        .parse()
                        .map_err(|_| format!("Invalid volume value: {}", value))?;
                }
                "-f" | "--format" => {
                    i += 1;
                    let value = args.get(i).ok_or("Missing value for --format")?;
                    output = match value.to_ascii_lowercase().as_str() {
                        "wav" | "uncompressed" => OutputFormat::Uncompressed,
                        "mp3" | "compressed" => OutputFormat::Compressed,
                        other => return Err(format!("Unknown output format: {}", other)),
                    };
                }
                "-b" | "--bitrate" => {
                    i += 1;
                    let value = args.get(i).ok_or("Missing value for --bitrate")?;
                    mp3_bitrate_kbps = value
                        .parse()
                        .map_err(|_| format!("Invalid bitrate value: {}", value))?;
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') => positional.push(PathBuf::from(arg)),
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        let main_path = positional.next().ok_or("Missing main audio argument")?;
        let watermark_path = positional.next().ok_or("Missing watermark audio argument")?;
        let output_path = positional.next();
        if let Some(extra) = positional.next() {
            return Err(format!("Unexpected argument: {}", extra.display()));
        }

        Ok(CliConfig {
            main_path,
            watermark_path,
            output_path,
            pipeline: PipelineConfig {
                mix,
                output,
                mp3_bitrate_kbps,
            },
        })
    }
}

fn print_help(program: &str) {
    eprintln!("Beat Watermarker");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <main-audio> <watermark-audio> [output]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -i, --interval <sec>    Seconds between watermarks (default: 12)");
    eprintln!("  -v, --volume <percent>  Watermark volume in percent (default: 75)");
    eprintln!("  -f, --format <wav|mp3>  Output format (default: wav)");
    eprintln!("  -b, --bitrate <kbps>    MP3 bitrate (default: 128)");
    eprintln!("  -h, --help              Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} beat.mp3 tag.wav", program);
    eprintln!("  {} -i 20 -v 40 beat.flac tag.wav preview.wav", program);
    eprintln!("  {} -f mp3 beat.wav tag.wav", program);
}

fn default_output_path(main_path: &Path, filename: String) -> PathBuf {
    match main_path.parent() {
        Some(dir) => dir.join(filename),
        None => PathBuf::from(filename),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = match CliConfig::parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help(&std::env::args().next().unwrap_or_else(|| "beatmark".into()));
            std::process::exit(1);
        }
    };

    let watermarker = Watermarker::new(config.pipeline);
    let result = watermarker.process_files(&config.main_path, &config.watermark_path)?;

    if let Some(warning) = &result.warning {
        warn!("{}", warning);
    }

    let main_name = config
        .main_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let output_path = config
        .output_path
        .unwrap_or_else(|| default_output_path(&config.main_path, result.filename(main_name)));

    result.audio.write_to(&output_path)?;

    println!(
        "Wrote {} ({}, {} bytes)",
        output_path.display(),
        result.audio.mime(),
        result.audio.len()
    );

    Ok(())
}
