use bytes::{Buf, BufMut, BytesMut};

use crate::Error;

/// Parsed fixed header: control byte, the length of the fixed header itself
/// (1 control byte + 1-4 remaining-length bytes), and the decoded remaining length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub byte1: u8,
    pub header_len: usize,
    pub remaining_len: usize,
}

impl FixedHeader {
    pub fn frame_len(&self) -> usize {
        self.header_len + self.remaining_len
    }
}

/// Look at (without consuming) the start of `stream` and try to parse a fixed
/// header. Returns `Ok(None)` when the stream doesn't yet hold enough bytes,
/// mirroring the `Decoder::decode` partial-read convention used throughout.
pub fn peek_fixed_header(stream: &[u8]) -> Result<Option<FixedHeader>, Error> {
    if stream.is_empty() {
        return Ok(None);
    }

    let byte1 = stream[0];
    let mut multiplier = 1usize;
    let mut value = 0usize;
    let mut pos = 1usize;

    loop {
        if pos >= stream.len() {
            return Ok(None);
        }

        let byte = stream[pos];
        value += (byte as usize & 0x7f) * multiplier;
        pos += 1;

        if byte & 0x80 == 0 {
            break;
        }

        multiplier *= 128;
        if multiplier > 128 * 128 * 128 {
            return Err(Error::MalformedRemainingLength);
        }
    }

    Ok(Some(FixedHeader {
        byte1,
        header_len: pos,
        remaining_len: value,
    }))
}

pub fn write_remaining_length(mut len: usize, buf: &mut BytesMut) -> Result<(), Error> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if len == 0 {
            break;
        }
    }
    Ok(())
}

pub(crate) fn extract_mqtt_string(bytes: &mut bytes::Bytes) -> Result<String, Error> {
    if bytes.len() < 2 {
        return Err(Error::BoundaryCrossed);
    }
    let len = bytes.get_u16() as usize;
    if len > bytes.len() {
        return Err(Error::BoundaryCrossed);
    }

    let s = bytes.split_to(len);
    String::from_utf8(s.to_vec()).map_err(|_| Error::TopicNotUtf8)
}

pub(crate) fn encode_mqtt_string(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}
