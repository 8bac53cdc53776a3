use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode frames from a byte stream and print them.
    Decode(DecodeArgs),
    /// Encode a single frame to stdout.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: Option<OutputFormat>) -> CliResult<i32> {
    match command {
        Command::Decode(args) => {
            decode::run(args, format.unwrap_or_else(OutputFormat::default_for_stdout))
        }
        Command::Encode(args) => encode::run(args, format.unwrap_or(OutputFormat::Raw)),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Only print these message types (comma-separated, decimal or 0x-prefixed hex).
    #[arg(long, value_delimiter = ',', value_parser = parse_u16)]
    pub types: Option<Vec<u16>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Re-examine the bytes of a rejected frame for an embedded preamble.
    #[arg(long)]
    pub rescan: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Message type (decimal or 0x-prefixed hex). Required for raw payloads.
    #[arg(
        long = "type",
        short = 't',
        value_parser = parse_u16,
        required_unless_present = "json",
        conflicts_with = "json"
    )]
    pub msg_type: Option<u16>,
    /// Sender ID (decimal or 0x-prefixed hex).
    #[arg(long, short = 's', value_parser = parse_u16, default_value = "0x42")]
    pub sender: u16,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file", "json"])]
    pub hex: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file", "json"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["hex", "data", "json"])]
    pub file: Option<PathBuf>,
    /// Typed file I/O message as JSON, tagged by `msg_name`.
    #[arg(long, conflicts_with_all = ["hex", "data", "file"])]
    pub json: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_u16(value: &str) -> Result<u16, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => value.parse::<u16>(),
    };
    parsed.map_err(|err| format!("invalid 16-bit value '{value}': {err}"))
}
