use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::header::{encode_mqtt_string, extract_mqtt_string, write_remaining_length};
use crate::{Error, FixedHeader, Protocol, QoS};
use crate::enums::qos;

/// The will message a client asks the broker to publish on its behalf if
/// the session ends without a clean DISCONNECT. Publication itself is out
/// of scope for this core (see crate docs); only the parsed fields travel
/// with the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub protocol: Protocol,
    pub keep_alive: u16,
    pub client_id: String,
    pub clean_session: bool,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl Connect {
    pub(crate) fn assemble(fixed_header: FixedHeader, mut bytes: Bytes) -> Result<Self, Error> {
        bytes.advance(fixed_header.header_len);

        let protocol_name = extract_mqtt_string(&mut bytes)?;
        if protocol_name != "MQIsdp" {
            return Err(Error::InvalidProtocol);
        }

        let protocol_level = bytes.get_u8();
        if protocol_level != 3 {
            return Err(Error::InvalidProtocolLevel(protocol_level));
        }

        let connect_flags = bytes.get_u8();
        let clean_session = (connect_flags & 0b0000_0010) != 0;
        let will_flag = (connect_flags & 0b0000_0100) != 0;
        let will_qos = (connect_flags & 0b0001_1000) >> 3;
        let will_retain = (connect_flags & 0b0010_0000) != 0;
        let password_flag = (connect_flags & 0b0100_0000) != 0;
        let username_flag = (connect_flags & 0b1000_0000) != 0;

        let keep_alive = bytes.get_u16();
        let client_id = extract_mqtt_string(&mut bytes)?;

        let last_will = if will_flag {
            let topic = extract_mqtt_string(&mut bytes)?;
            let len = bytes.get_u16() as usize;
            if len > bytes.len() {
                return Err(Error::BoundaryCrossed);
            }
            let message = bytes.split_to(len);
            Some(LastWill {
                topic,
                message,
                qos: qos(will_qos)?,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(extract_mqtt_string(&mut bytes)?)
        } else {
            None
        };

        let password = if password_flag {
            let len = bytes.get_u16() as usize;
            if len > bytes.len() {
                return Err(Error::BoundaryCrossed);
            }
            Some(bytes.split_to(len))
        } else {
            None
        };

        Ok(Connect {
            protocol: Protocol::MQIsdp3,
            keep_alive,
            client_id,
            clean_session,
            last_will,
            username,
            password,
        })
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) -> Result<(), Error> {
        let mut var_header = BytesMut::new();
        encode_mqtt_string(&mut var_header, "MQIsdp");
        var_header.put_u8(3);

        let mut flags = 0u8;
        if self.clean_session {
            flags |= 0b0000_0010;
        }
        if let Some(will) = &self.last_will {
            flags |= 0b0000_0100;
            flags |= (will.qos as u8) << 3;
            if will.retain {
                flags |= 0b0010_0000;
            }
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }
        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        var_header.put_u8(flags);
        var_header.put_u16(self.keep_alive);

        let mut payload = BytesMut::new();
        encode_mqtt_string(&mut payload, &self.client_id);
        if let Some(will) = &self.last_will {
            encode_mqtt_string(&mut payload, &will.topic);
            payload.put_u16(will.message.len() as u16);
            payload.put_slice(&will.message);
        }
        if let Some(username) = &self.username {
            encode_mqtt_string(&mut payload, username);
        }
        if let Some(password) = &self.password {
            payload.put_u16(password.len() as u16);
            payload.put_slice(password);
        }

        let remaining_len = var_header.len() + payload.len();
        buf.put_u8(0b0001_0000);
        write_remaining_length(remaining_len, buf)?;
        buf.extend_from_slice(&var_header);
        buf.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    fn sample() -> Connect {
        Connect {
            protocol: Protocol::MQIsdp3,
            keep_alive: 30,
            client_id: "A".into(),
            clean_session: true,
            last_will: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn connect_round_trips_without_will_or_credentials() {
        let connect = sample();
        let mut buf = BytesMut::new();
        connect.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        let decoded = Connect::assemble(header, body).unwrap();
        assert_eq!(decoded, connect);
    }

    #[test]
    fn connect_round_trips_with_will_and_credentials() {
        let mut connect = sample();
        connect.clean_session = false;
        connect.last_will = Some(LastWill {
            topic: "lwt/a".into(),
            message: Bytes::from_static(b"bye"),
            qos: QoS::AtLeastOnce,
            retain: true,
        });
        connect.username = Some("user".into());
        connect.password = Some(Bytes::from_static(b"pass"));

        let mut buf = BytesMut::new();
        connect.write(&mut buf).unwrap();

        let header = crate::header::peek_fixed_header(&buf).unwrap().unwrap();
        let body = buf.split_to(header.frame_len()).freeze();
        let decoded = Connect::assemble(header, body).unwrap();
        assert_eq!(decoded, connect);
    }

    #[test]
    fn rejects_unknown_protocol_name() {
        let mut buf = BytesMut::new();
        encode_mqtt_string(&mut buf, "MQTT");
        buf.put_u8(3);
        buf.put_u8(0b0000_0010);
        buf.put_u16(30);
        encode_mqtt_string(&mut buf, "id");

        let mut frame = BytesMut::new();
        frame.put_u8(0b0001_0000);
        write_remaining_length(buf.len(), &mut frame).unwrap();
        frame.extend_from_slice(&buf);

        let header = crate::header::peek_fixed_header(&frame).unwrap().unwrap();
        let body = frame.split_to(header.frame_len()).freeze();
        assert!(matches!(
            Connect::assemble(header, body),
            Err(Error::InvalidProtocol)
        ));
    }
}
