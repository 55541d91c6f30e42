use crate::handshake::NodeIdentityKind;
use crate::wire::WireError;
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HandshakeError {
    #[error("Cluster id mismatch: expected '{expected}', peer presented '{actual}'")]
    ClusterIdMismatch { expected: String, actual: String },
    #[error("Unrecognized node identity kind {0}")]
    UnrecognizedIdentityKind(i32),
    #[error("Peer identity kind {0:?} cannot open a silo link")]
    UnsupportedIdentityKind(NodeIdentityKind),
    #[error("Unsupported protocol version {actual}, minimum is {minimum}")]
    UnsupportedProtocolVersion { actual: u32, minimum: u32 },
    #[error("Silo preamble is missing its silo address")]
    MissingSiloAddress,
    #[error("Malformed preamble: {0}")]
    Malformed(#[from] WireError),
    #[error("Connection closed before the peer's preamble arrived")]
    ConnectionClosed,
    // io::Error isn't Clone, and link state needs to hand the cause out to every observer.
    #[error("I/O error during handshake: {0}")]
    Io(String),
    #[error("Handshake did not complete within {0:?}")]
    TimedOut(Duration),
}

impl From<io::Error> for HandshakeError {
    fn from(e: io::Error) -> Self {
        HandshakeError::Io(e.to_string())
    }
}
