use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::enums::qos;
use crate::header::{encode_mqtt_string, extract_mqtt_string, write_remaining_length};
use crate::{Error, FixedHeader, QoS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub topic_path: String,
    pub qos: QoS,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscribe {
    pub pkid: u16,
    pub topics: Vec<SubscribeTopic>,
}

impl Subscribe {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        bytes.advance(fixed_header.header_len);
        if bytes.len() < 2 {
            return Err(Error::BoundaryCrossed);
        }
        let pkid = bytes.get_u16();

        let mut topics = Vec::new();
        while !bytes.is_empty() {
            let topic_path = extract_mqtt_string(&mut bytes)?;
            if bytes.is_empty() {
                return Err(Error::BoundaryCrossed);
            }
            let requested_qos = bytes.get_u8();
            topics.push(SubscribeTopic {
                topic_path,
                qos: qos(requested_qos)?,
            });
        }

        if topics.is_empty() {
            return Err(Error::PayloadRequired);
        }

        Ok(Subscribe { pkid, topics })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> Result<(), Error> {
        let mut payload = BytesMut::new();
        payload.put_u16(self.pkid);
        for topic in &self.topics {
            encode_mqtt_string(&mut payload, &topic.topic_path);
            payload.put_u8(topic.qos as u8);
        }

        buf.put_u8(0b1000_0010);
        write_remaining_length(payload.len(), buf)?;
        buf.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subscribe_round_trips_multiple_topics() {
        let subscribe = Subscribe {
            pkid: 260,
            topics: vec![
                SubscribeTopic {
                    topic_path: "a/+".into(),
                    qos: QoS::AtMostOnce,
                },
                SubscribeTopic {
                    topic_path: "#".into(),
                    qos: QoS::AtLeastOnce,
                },
            ],
        };
        let mut buf = BytesMut::new();
        subscribe.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        assert_eq!(Subscribe::assemble(header, body).unwrap(), subscribe);
    }
}
