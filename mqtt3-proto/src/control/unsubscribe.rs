use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::header::{encode_mqtt_string, extract_mqtt_string, write_remaining_length};
use crate::{Error, FixedHeader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub pkid: u16,
    pub topics: Vec<String>,
}

impl Unsubscribe {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        bytes.advance(fixed_header.header_len);
        if bytes.len() < 2 {
            return Err(Error::BoundaryCrossed);
        }
        let pkid = bytes.get_u16();

        let mut topics = Vec::new();
        while !bytes.is_empty() {
            topics.push(extract_mqtt_string(&mut bytes)?);
        }

        if topics.is_empty() {
            return Err(Error::PayloadRequired);
        }

        Ok(Unsubscribe { pkid, topics })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> Result<(), Error> {
        let mut payload = BytesMut::new();
        payload.put_u16(self.pkid);
        for topic in &self.topics {
            encode_mqtt_string(&mut payload, topic);
        }

        buf.put_u8(0b1010_0010);
        write_remaining_length(payload.len(), buf)?;
        buf.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsubscribe_round_trips() {
        let unsubscribe = Unsubscribe {
            pkid: 7,
            topics: vec!["x/#".into(), "y/1".into()],
        };
        let mut buf = BytesMut::new();
        unsubscribe.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(Unsubscribe::assemble(header, body).unwrap(), unsubscribe);
    }
}
