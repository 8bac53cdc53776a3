use std::io;

use sbprims_dispatch::EncodeError;
use sbprims_frame::{Frame, FrameWriter};
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::messages::KnownMessage;
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = frame_from_args(&args)?;

    debug!(
        msg_type = frame.msg_type,
        sender_id = frame.sender_id,
        len = frame.payload.len(),
        crc = frame.crc,
        "encoded frame"
    );

    match format {
        OutputFormat::Raw => {
            let mut writer = FrameWriter::new(io::stdout().lock());
            writer
                .write_frame(&frame)
                .map_err(|err| frame_error("write failed", err))?;
        }
        other => print_encoded(&frame, other),
    }

    Ok(SUCCESS)
}

fn frame_from_args(args: &EncodeArgs) -> CliResult<Frame> {
    if let Some(json) = &args.json {
        let message: KnownMessage = serde_json::from_str(json)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid message JSON: {err}")))?;
        return message
            .to_frame(args.sender)
            .map_err(|err| encode_error("encode failed", err));
    }

    let Some(msg_type) = args.msg_type else {
        return Err(CliError::new(USAGE, "--type is required for raw payloads"));
    };
    let payload = payload_from_args(args)?;
    Frame::new(msg_type, args.sender, payload).map_err(|err| frame_error("encode failed", err))
}

fn payload_from_args(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(text) = &args.hex {
        let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        return hex::decode(digits)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex payload: {err}")));
    }

    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }

    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err));
    }

    Err(CliError::new(
        USAGE,
        "one of --hex, --data, --file, or --json is required",
    ))
}

fn encode_error(context: &str, err: EncodeError) -> CliError {
    match err {
        EncodeError::Frame(err) => frame_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}
