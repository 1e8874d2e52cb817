use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::enums::packet_type;
use crate::header::peek_fixed_header;
use crate::{Error, Packet, PacketType};

/// `tokio_util::codec::{Decoder, Encoder}` pair for MQIsdp/3 frames.
///
/// Decoding follows the standard partial-read convention: `Ok(None)` means
/// the buffer doesn't yet hold a complete frame, not an error. The state
/// machine above this codec treats only `Err` as a
/// decode error.
#[derive(Debug, Default)]
pub struct MqttCodec;

impl Decoder for MqttCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Error> {
        let fixed_header = match peek_fixed_header(src)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if src.len() < fixed_header.frame_len() {
            src.reserve(fixed_header.frame_len() - src.len());
            return Ok(None);
        }

        let frame = src.split_to(fixed_header.frame_len()).freeze();
        let kind = packet_type((fixed_header.byte1 & 0xf0) >> 4)?;

        let packet = match kind {
            PacketType::Connect => Packet::Connect(crate::Connect::assemble(fixed_header, frame)?),
            PacketType::ConnAck => Packet::ConnAck(crate::ConnAck::assemble(fixed_header, frame)?),
            PacketType::Publish => Packet::Publish(crate::Publish::assemble(fixed_header, frame)?),
            PacketType::PubAck => Packet::PubAck(crate::PubAck::assemble(fixed_header, frame)?),
            PacketType::Subscribe => Packet::Subscribe(crate::Subscribe::assemble(fixed_header, frame)?),
            PacketType::SubAck => Packet::SubAck(crate::SubAck::assemble(fixed_header, frame)?),
            PacketType::Unsubscribe => {
                Packet::Unsubscribe(crate::Unsubscribe::assemble(fixed_header, frame)?)
            }
            PacketType::UnsubAck => Packet::UnsubAck(crate::UnsubAck::assemble(fixed_header, frame)?),
            PacketType::PingReq => Packet::PingReq,
            PacketType::PingResp => Packet::PingResp,
            PacketType::Disconnect => Packet::Disconnect,
            PacketType::PubRec | PacketType::PubRel | PacketType::PubComp => {
                return Err(Error::InvalidPacketType(fixed_header.byte1 >> 4));
            }
        };

        Ok(Some(packet))
    }
}

impl Encoder for MqttCodec {
    type Item = Packet;
    type Error = Error;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Error> {
        match packet {
            Packet::Connect(connect) => connect.write(dst),
            Packet::ConnAck(connack) => {
                connack.write(dst);
                Ok(())
            }
            Packet::Publish(publish) => publish.write(dst),
            Packet::PubAck(puback) => {
                puback.write(dst);
                Ok(())
            }
            Packet::Subscribe(subscribe) => subscribe.write(dst),
            Packet::SubAck(suback) => suback.write(dst),
            Packet::Unsubscribe(unsubscribe) => unsubscribe.write(dst),
            Packet::UnsubAck(unsuback) => {
                unsuback.write(dst);
                Ok(())
            }
            Packet::PingReq => {
                dst.extend_from_slice(&[0b1100_0000, 0x00]);
                Ok(())
            }
            Packet::PingResp => {
                dst.extend_from_slice(&[0b1101_0000, 0x00]);
                Ok(())
            }
            Packet::Disconnect => {
                dst.extend_from_slice(&[0b1110_0000, 0x00]);
                Ok(())
            }
        }
    }
}
