use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, FixedHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAck {
    pub pkid: u16,
}

impl PubAck {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        if fixed_header.remaining_len != 2 {
            return Err(Error::PayloadSizeIncorrect);
        }
        bytes.advance(fixed_header.header_len);
        Ok(PubAck {
            pkid: bytes.get_u16(),
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(0b0100_0000);
        buf.put_u8(2);
        buf.put_u16(self.pkid);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn puback_round_trips() {
        let puback = PubAck { pkid: 10 };
        let mut buf = BytesMut::new();
        puback.write(&mut buf);

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(PubAck::assemble(header, body).unwrap(), puback);
    }
}
