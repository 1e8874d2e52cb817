#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid connect return code `{0}`")]
    InvalidConnectReturnCode(u8),
    #[error("Invalid protocol. Expecting 'MQIsdp' in payload")]
    InvalidProtocol,
    #[error("Invalid protocol level `{0}`")]
    InvalidProtocolLevel(u8),
    #[error("Unsupported packet type `{0}`")]
    InvalidPacketType(u8),
    #[error("Unsupported QoS `{0}`")]
    InvalidQoS(u8),
    #[error("Payload size incorrect")]
    PayloadSizeIncorrect,
    #[error("Payload required")]
    PayloadRequired,
    #[error("Payload size limit exceeded ({0} bytes)")]
    PayloadSizeLimitExceeded(usize),
    #[error("Topic name must only contain valid UTF-8")]
    TopicNotUtf8,
    #[error("Malformed remaining length")]
    MalformedRemainingLength,
    #[error("Trying to access wrong boundary")]
    BoundaryCrossed,
    #[error("I/O")]
    Io(#[from] std::io::Error),
}
