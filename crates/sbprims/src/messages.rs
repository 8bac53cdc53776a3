use bytes::{Buf, BufMut, BytesMut};
use sbprims_dispatch::{DecodeError, EncodeError, Message, MessageRegistry};
use sbprims_frame::msg_type::{
    MSG_FILEIO_READ_DIR_REQ, MSG_FILEIO_READ_DIR_RESP, MSG_FILEIO_READ_REQ, MSG_FILEIO_READ_RESP,
    MSG_FILEIO_REMOVE, MSG_FILEIO_WRITE_REQ, MSG_FILEIO_WRITE_RESP,
};
use sbprims_frame::Frame;
use serde::{Deserialize, Serialize};

/// Fixed width of file and directory names, NUL-padded on the wire.
const NAME_LEN: usize = 20;

/// Onboard file I/O messages the CLI can decode and encode.
///
/// The JSON form is tagged by `msg_name`, e.g.
/// `{"msg_name":"MSG_FILEIO_REMOVE","filename":"old.log"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_name")]
pub enum KnownMessage {
    #[serde(rename = "MSG_FILEIO_READ_REQ")]
    FileioReadReq(FileioReadReq),
    #[serde(rename = "MSG_FILEIO_READ_RESP")]
    FileioReadResp(FileioReadResp),
    #[serde(rename = "MSG_FILEIO_READ_DIR_REQ")]
    FileioReadDirReq(FileioReadDirReq),
    #[serde(rename = "MSG_FILEIO_READ_DIR_RESP")]
    FileioReadDirResp(FileioReadDirResp),
    #[serde(rename = "MSG_FILEIO_REMOVE")]
    FileioRemove(FileioRemove),
    #[serde(rename = "MSG_FILEIO_WRITE_REQ")]
    FileioWriteReq(FileioWriteReq),
    #[serde(rename = "MSG_FILEIO_WRITE_RESP")]
    FileioWriteResp(FileioWriteResp),
}

impl KnownMessage {
    pub fn to_frame(&self, sender_id: u16) -> Result<Frame, EncodeError> {
        match self {
            Self::FileioReadReq(msg) => msg.to_frame(sender_id),
            Self::FileioReadResp(msg) => msg.to_frame(sender_id),
            Self::FileioReadDirReq(msg) => msg.to_frame(sender_id),
            Self::FileioReadDirResp(msg) => msg.to_frame(sender_id),
            Self::FileioRemove(msg) => msg.to_frame(sender_id),
            Self::FileioWriteReq(msg) => msg.to_frame(sender_id),
            Self::FileioWriteResp(msg) => msg.to_frame(sender_id),
        }
    }
}

/// Read `chunk_size` bytes of `filename` starting at `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioReadReq {
    pub offset: u32,
    pub chunk_size: u8,
    pub filename: String,
}

/// Reply to a read request; `contents` is empty past end of file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioReadResp {
    pub offset: u32,
    pub chunk_size: u8,
    pub filename: String,
    #[serde(with = "hex::serde")]
    pub contents: Vec<u8>,
}

/// List `dirname`, skipping the first `offset` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioReadDirReq {
    pub offset: u32,
    pub dirname: String,
}

/// Directory entries as NUL-separated names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioReadDirResp {
    pub offset: u32,
    pub dirname: String,
    #[serde(with = "hex::serde")]
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioRemove {
    pub filename: String,
}

/// Write `data` into `filename` at `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioWriteReq {
    pub filename: String,
    pub offset: u32,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileioWriteResp {
    pub filename: String,
    pub offset: u32,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl Message for FileioReadReq {
    const MSG_TYPE: u16 = MSG_FILEIO_READ_REQ;
    const NAME: &'static str = "MSG_FILEIO_READ_REQ";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, 4 + 1 + NAME_LEN)?;
        let offset = payload.get_u32_le();
        let chunk_size = payload.get_u8();
        let filename = get_name(&mut payload)?;
        Ok(Self {
            offset,
            chunk_size,
            filename,
        })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        dst.put_u32_le(self.offset);
        dst.put_u8(self.chunk_size);
        put_name(dst, "filename", &self.filename)
    }
}

impl Message for FileioReadResp {
    const MSG_TYPE: u16 = MSG_FILEIO_READ_RESP;
    const NAME: &'static str = "MSG_FILEIO_READ_RESP";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, 4 + 1 + NAME_LEN)?;
        let offset = payload.get_u32_le();
        let chunk_size = payload.get_u8();
        let filename = get_name(&mut payload)?;
        Ok(Self {
            offset,
            chunk_size,
            filename,
            contents: payload.to_vec(),
        })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        dst.put_u32_le(self.offset);
        dst.put_u8(self.chunk_size);
        put_name(dst, "filename", &self.filename)?;
        dst.put_slice(&self.contents);
        Ok(())
    }
}

impl Message for FileioReadDirReq {
    const MSG_TYPE: u16 = MSG_FILEIO_READ_DIR_REQ;
    const NAME: &'static str = "MSG_FILEIO_READ_DIR_REQ";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, 4 + NAME_LEN)?;
        let offset = payload.get_u32_le();
        let dirname = get_name(&mut payload)?;
        Ok(Self { offset, dirname })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        dst.put_u32_le(self.offset);
        put_name(dst, "dirname", &self.dirname)
    }
}

impl Message for FileioReadDirResp {
    const MSG_TYPE: u16 = MSG_FILEIO_READ_DIR_RESP;
    const NAME: &'static str = "MSG_FILEIO_READ_DIR_RESP";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, 4 + NAME_LEN)?;
        let offset = payload.get_u32_le();
        let dirname = get_name(&mut payload)?;
        Ok(Self {
            offset,
            dirname,
            contents: payload.to_vec(),
        })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        dst.put_u32_le(self.offset);
        put_name(dst, "dirname", &self.dirname)?;
        dst.put_slice(&self.contents);
        Ok(())
    }
}

impl Message for FileioRemove {
    const MSG_TYPE: u16 = MSG_FILEIO_REMOVE;
    const NAME: &'static str = "MSG_FILEIO_REMOVE";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, NAME_LEN)?;
        let filename = get_name(&mut payload)?;
        Ok(Self { filename })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        put_name(dst, "filename", &self.filename)
    }
}

impl Message for FileioWriteReq {
    const MSG_TYPE: u16 = MSG_FILEIO_WRITE_REQ;
    const NAME: &'static str = "MSG_FILEIO_WRITE_REQ";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, NAME_LEN + 4)?;
        let filename = get_name(&mut payload)?;
        let offset = payload.get_u32_le();
        Ok(Self {
            filename,
            offset,
            data: payload.to_vec(),
        })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        put_name(dst, "filename", &self.filename)?;
        dst.put_u32_le(self.offset);
        dst.put_slice(&self.data);
        Ok(())
    }
}

impl Message for FileioWriteResp {
    const MSG_TYPE: u16 = MSG_FILEIO_WRITE_RESP;
    const NAME: &'static str = "MSG_FILEIO_WRITE_RESP";

    fn from_payload(mut payload: &[u8]) -> Result<Self, DecodeError> {
        check_len(payload, NAME_LEN + 4)?;
        let filename = get_name(&mut payload)?;
        let offset = payload.get_u32_le();
        Ok(Self {
            filename,
            offset,
            data: payload.to_vec(),
        })
    }

    fn write_payload(&self, dst: &mut BytesMut) -> Result<(), EncodeError> {
        put_name(dst, "filename", &self.filename)?;
        dst.put_u32_le(self.offset);
        dst.put_slice(&self.data);
        Ok(())
    }
}

impl From<FileioReadReq> for KnownMessage {
    fn from(msg: FileioReadReq) -> Self {
        Self::FileioReadReq(msg)
    }
}

impl From<FileioReadResp> for KnownMessage {
    fn from(msg: FileioReadResp) -> Self {
        Self::FileioReadResp(msg)
    }
}

impl From<FileioReadDirReq> for KnownMessage {
    fn from(msg: FileioReadDirReq) -> Self {
        Self::FileioReadDirReq(msg)
    }
}

impl From<FileioReadDirResp> for KnownMessage {
    fn from(msg: FileioReadDirResp) -> Self {
        Self::FileioReadDirResp(msg)
    }
}

impl From<FileioRemove> for KnownMessage {
    fn from(msg: FileioRemove) -> Self {
        Self::FileioRemove(msg)
    }
}

impl From<FileioWriteReq> for KnownMessage {
    fn from(msg: FileioWriteReq) -> Self {
        Self::FileioWriteReq(msg)
    }
}

impl From<FileioWriteResp> for KnownMessage {
    fn from(msg: FileioWriteResp) -> Self {
        Self::FileioWriteResp(msg)
    }
}

pub fn registry() -> MessageRegistry<KnownMessage> {
    let mut registry = MessageRegistry::new();
    registry.register::<FileioReadReq>();
    registry.register::<FileioReadResp>();
    registry.register::<FileioReadDirReq>();
    registry.register::<FileioReadDirResp>();
    registry.register::<FileioRemove>();
    registry.register::<FileioWriteReq>();
    registry.register::<FileioWriteResp>();
    registry
}

fn check_len(payload: &[u8], needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: payload.len(),
        });
    }
    Ok(())
}

// Callers check that NAME_LEN bytes remain.
fn get_name(payload: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = *payload;
    let (name, rest) = bytes.split_at(NAME_LEN);
    *payload = rest;
    let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    std::str::from_utf8(&name[..end])
        .map(str::to_string)
        .map_err(|err| DecodeError::Invalid(err.to_string()))
}

fn put_name(dst: &mut BytesMut, field: &'static str, name: &str) -> Result<(), EncodeError> {
    if name.len() > NAME_LEN {
        return Err(EncodeError::FieldTooLong {
            field,
            len: name.len(),
            max: NAME_LEN,
        });
    }
    dst.put_slice(name.as_bytes());
    dst.put_bytes(0, NAME_LEN - name.len());
    Ok(())
}
