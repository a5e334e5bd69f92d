pub mod duration;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};

pub const DEFAULT_OUTPUT: &str = "AudioFile.wav";

fn parse_frequency(value: &str) -> Result<f32, String> {
    let frequency: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frequency '{value}'"))?;
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err("frequency must be a positive number".into());
    }
    Ok(frequency)
}

fn parse_amplitude(value: &str) -> Result<f32, String> {
    let amplitude: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid amplitude '{value}'"))?;
    if !amplitude.is_finite() || amplitude < 0.0 {
        return Err("amplitude must be a non-negative number".into());
    }
    Ok(amplitude)
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Write a sine tone to a 16-bit PCM WAV file")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("frequency")
                .short('f')
                .long("frequency")
                .value_name("HZ")
                .help("Tone frequency in hertz")
                .default_value("440")
                .value_parser(ValueParser::new(parse_frequency)),
        )
        .arg(
            Arg::new("sample-rate")
                .short('r')
                .long("sample-rate")
                .value_name("HZ")
                .help("Samples per second")
                .default_value("44100")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("DURATION")
                .help("Length of the tone in whole seconds (e.g. 3s, 1m30s)")
                .default_value("3s")
                .value_parser(ValueParser::new(duration::parse_whole_seconds)),
        )
        .arg(
            Arg::new("amplitude")
                .short('a')
                .long("amplitude")
                .value_name("SCALE")
                .help("Peak sample value; values above 32767 saturate")
                .default_value("32767")
                .value_parser(ValueParser::new(parse_amplitude)),
        )
        .arg(
            Arg::new("workers")
                .short('j')
                .long("workers")
                .value_name("N")
                .help("Number of worker threads [default: available parallelism, at most 16]")
                .value_parser(value_parser!(NonZeroUsize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("DURATION")
                .help("How long to wait for the workers before giving up")
                .default_value("30s")
                .value_parser(ValueParser::new(duration::parse_timeout)),
        )
        .arg(
            Arg::new("scalar")
                .long("scalar")
                .help("Render with the per-sample reference kernel")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Replace the output file if it already exists")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the header and partition plan without writing a file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .help("Path of the WAV file to write")
                .default_value(DEFAULT_OUTPUT)
                .value_parser(value_parser!(PathBuf)),
        )
}
