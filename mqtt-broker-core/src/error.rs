use derive_more::From;

/// Unified error type for the connection engine. Decode errors, I/O errors
/// and protocol-level violations all funnel through here so a single
/// `match` at the top of the inbound loop can decide whether a failure is
/// "log and continue" or "terminate the session".
#[derive(Debug, From)]
pub enum Error {
    Codec(mqtt3_proto::Error),
    Io(std::io::Error),
    /// Frame valid for no state the connection is currently in.
    UnexpectedPacket,
    /// CONNECT carried a disqualifying field; the return code to reply
    /// with travels alongside so the caller can still send a `ConnAck`.
    Rejected(mqtt3_proto::ConnectReturnCode),
}

impl Error {
    /// True for the malformed protocol name/level the inbound loop still
    /// owes a `ConnAck(UnacceptableProtocolVersion)` before closing.
    pub fn is_bad_protocol(&self) -> bool {
        matches!(
            self,
            Error::Codec(mqtt3_proto::Error::InvalidProtocol)
                | Error::Codec(mqtt3_proto::Error::InvalidProtocolLevel(_))
        )
    }

    /// True for EOF and "use of closed network connection" style I/O
    /// failures: routine teardown, not worth an
    /// error-level log.
    pub fn is_benign_close(&self) -> bool {
        let kind = match self {
            Error::Io(e) => Some(e.kind()),
            Error::Codec(mqtt3_proto::Error::Io(e)) => Some(e.kind()),
            _ => None,
        };
        matches!(
            kind,
            Some(
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            )
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "codec error: {}", e),
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::UnexpectedPacket => write!(f, "unexpected packet for current state"),
            Error::Rejected(code) => write!(f, "connect rejected: {:?}", code),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bad_protocol_name_is_detected() {
        let err = Error::Codec(mqtt3_proto::Error::InvalidProtocol);
        assert!(err.is_bad_protocol());
        assert!(!err.is_benign_close());
    }

    #[test]
    fn bad_protocol_level_is_detected() {
        let err = Error::Codec(mqtt3_proto::Error::InvalidProtocolLevel(99));
        assert!(err.is_bad_protocol());
    }

    #[test]
    fn reset_connection_is_a_benign_close() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::Io(io);
        assert!(err.is_benign_close());
        assert!(!err.is_bad_protocol());
    }

    #[test]
    fn malformed_remaining_length_is_neither() {
        let err = Error::Codec(mqtt3_proto::Error::MalformedRemainingLength);
        assert!(!err.is_bad_protocol());
        assert!(!err.is_benign_close());
    }
}
