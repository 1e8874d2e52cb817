use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::enums::qos;
use crate::header::write_remaining_length;
use crate::{Error, FixedHeader, QoS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeReturnCode {
    Success(QoS),
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub pkid: u16,
    pub return_codes: Vec<SubscribeReturnCode>,
}

impl SubAck {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        bytes.advance(fixed_header.header_len);
        if bytes.len() < 2 {
            return Err(Error::BoundaryCrossed);
        }
        let pkid = bytes.get_u16();

        let mut return_codes = Vec::new();
        while !bytes.is_empty() {
            let code = bytes.get_u8();
            if code & 0x80 != 0 {
                return_codes.push(SubscribeReturnCode::Failure);
            } else {
                return_codes.push(SubscribeReturnCode::Success(qos(code & 0x03)?));
            }
        }

        Ok(SubAck { pkid, return_codes })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> Result<(), Error> {
        let mut payload = BytesMut::new();
        payload.put_u16(self.pkid);
        for code in &self.return_codes {
            let byte = match code {
                SubscribeReturnCode::Success(qos) => *qos as u8,
                SubscribeReturnCode::Failure => 0x80,
            };
            payload.put_u8(byte);
        }

        buf.put_u8(0b1001_0000);
        write_remaining_length(payload.len(), buf)?;
        buf.extend_from_slice(&payload);
        Ok(())
    }
}
