use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::enums::qos;
use crate::header::{encode_mqtt_string, extract_mqtt_string, write_remaining_length};
use crate::{Error, FixedHeader, QoS};

#[derive(Debug, Clone, PartialEq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic_name: String,
    /// Zero for QoS 0; MQTT calls this the packet identifier.
    pub pkid: u16,
    pub payload: Bytes,
}

impl Publish {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        let dup = (fixed_header.byte1 & 0b0000_1000) != 0;
        let qos_val = qos((fixed_header.byte1 & 0b0000_0110) >> 1)?;
        let retain = (fixed_header.byte1 & 0b0000_0001) != 0;

        bytes.advance(fixed_header.header_len);
        let topic_name = extract_mqtt_string(&mut bytes)?;

        let pkid = match qos_val {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce | QoS::ExactlyOnce => {
                if bytes.len() < 2 {
                    return Err(Error::BoundaryCrossed);
                }
                bytes.get_u16()
            }
        };

        Ok(Publish {
            dup,
            qos: qos_val,
            retain,
            topic_name,
            pkid,
            payload: bytes,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> Result<(), Error> {
        let mut var_header = BytesMut::new();
        encode_mqtt_string(&mut var_header, &self.topic_name);
        if self.qos != QoS::AtMostOnce {
            var_header.put_u16(self.pkid);
        }

        let remaining_len = var_header.len() + self.payload.len();
        let mut byte1 = 0b0011_0000u8;
        if self.dup {
            byte1 |= 0b0000_1000;
        }
        byte1 |= (self.qos as u8) << 1;
        if self.retain {
            byte1 |= 0b0000_0001;
        }

        buf.put_u8(byte1);
        write_remaining_length(remaining_len, buf)?;
        buf.extend_from_slice(&var_header);
        buf.extend_from_slice(&self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn qos0_publish_has_no_pkid() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic_name: "room/1".into(),
            pkid: 0,
            payload: Bytes::from_static(b"hi"),
        };
        let mut buf = BytesMut::new();
        publish.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(Publish::assemble(header, body).unwrap(), publish);
    }

    #[test]
    fn qos1_publish_round_trips_pkid_and_flags() {
        let publish = Publish {
            dup: true,
            qos: QoS::AtLeastOnce,
            retain: true,
            topic_name: "t".into(),
            pkid: 42,
            payload: Bytes::from_static(b"payload"),
        };
        let mut buf = BytesMut::new();
        publish.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(Publish::assemble(header, body).unwrap(), publish);
    }
}
