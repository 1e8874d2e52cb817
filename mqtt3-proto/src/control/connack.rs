use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ConnectReturnCode, Error, FixedHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub code: ConnectReturnCode,
}

impl ConnAck {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        if fixed_header.remaining_len != 2 {
            return Err(Error::PayloadSizeIncorrect);
        }

        bytes.advance(fixed_header.header_len);
        let flags = bytes.get_u8();
        let code = match bytes.get_u8() {
            0 => ConnectReturnCode::Accepted,
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUsernameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            code => return Err(Error::InvalidConnectReturnCode(code)),
        };

        Ok(ConnAck {
            session_present: flags & 0x01 != 0,
            code,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(0b0010_0000);
        buf.put_u8(2);
        buf.put_u8(self.session_present as u8);
        buf.put_u8(self.code as u8);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connack_round_trips() {
        let connack = ConnAck {
            session_present: false,
            code: ConnectReturnCode::Accepted,
        };
        let mut buf = BytesMut::new();
        connack.write(&mut buf);

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(ConnAck::assemble(header, body).unwrap(), connack);
    }
}
