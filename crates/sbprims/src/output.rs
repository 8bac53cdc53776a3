use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sbprims_frame::{Frame, MsgTypeRange};
use serde::Serialize;

use crate::messages::KnownMessage;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    msg_type: u16,
    msg_name: &'a str,
    range: &'static str,
    sender_id: u16,
    length: usize,
    crc: String,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<&'a KnownMessage>,
}

#[derive(Serialize)]
struct EncodedOutput {
    msg_type: u16,
    sender_id: u16,
    length: usize,
    crc: String,
    wire: String,
}

pub fn print_frame(
    frame: &Frame,
    msg_name: &str,
    decoded: Option<&KnownMessage>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                msg_type: frame.msg_type,
                msg_name,
                range: MsgTypeRange::of(frame.msg_type).name(),
                sender_id: frame.sender_id,
                length: frame.payload.len(),
                crc: format_crc(frame.crc),
                payload: hex::encode(&frame.payload),
                decoded,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "NAME", "SENDER", "LEN", "CRC", "PAYLOAD"])
                .add_row(vec![
                    format!("0x{:04x}", frame.msg_type),
                    msg_name.to_string(),
                    format!("0x{:04x}", frame.sender_id),
                    frame.payload.len().to_string(),
                    format_crc(frame.crc),
                    payload_preview(&frame.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type=0x{:04x} ({}) sender=0x{:04x} len={} crc={} payload={}",
                frame.msg_type,
                msg_name,
                frame.sender_id,
                frame.payload.len(),
                format_crc(frame.crc),
                payload_preview(&frame.payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(&wire_bytes(frame));
        }
    }
}

pub fn print_encoded(frame: &Frame, format: OutputFormat) {
    let wire = wire_bytes(frame);
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                msg_type: frame.msg_type,
                sender_id: frame.sender_id,
                length: frame.payload.len(),
                crc: format_crc(frame.crc),
                wire: hex::encode(&wire),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "SENDER", "LEN", "CRC", "WIRE"])
                .add_row(vec![
                    format!("0x{:04x}", frame.msg_type),
                    format!("0x{:04x}", frame.sender_id),
                    frame.payload.len().to_string(),
                    format_crc(frame.crc),
                    hex::encode(&wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex::encode(&wire)),
        OutputFormat::Raw => print_raw(&wire),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn wire_bytes(frame: &Frame) -> Vec<u8> {
    let mut buf = bytes::BytesMut::with_capacity(frame.wire_size());
    // Frames reaching output were either decoded or built by Frame::new,
    // so the payload length is always representable.
    match frame.encode(&mut buf) {
        Ok(()) => buf.to_vec(),
        Err(_) => Vec::new(),
    }
}

fn format_crc(crc: u16) -> String {
    format!("0x{crc:04x}")
}

fn payload_preview(payload: &[u8]) -> String {
    if payload.is_empty() {
        return "-".to_string();
    }
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => hex::encode(payload),
    }
}
