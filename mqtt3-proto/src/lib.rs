//! MQTT 3.1 ("MQIsdp", protocol level 3) wire codec.
//!
//! Implements `tokio_util::codec::{Decoder, Encoder}` over `bytes::BytesMut`
//! for the fixed-header / remaining-length framing shared by the protocol
//! family, plus the ten packet variants this broker core speaks.

mod codec;
mod control;
mod enums;
mod err;
mod header;

pub use codec::MqttCodec;
pub use control::*;
pub use enums::*;
pub use err::Error;
pub use header::{peek_fixed_header, FixedHeader};
