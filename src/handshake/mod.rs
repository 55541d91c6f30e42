//! The one-time connection preamble. Each side writes its own preamble as the first frame and
//! reads the peer's; nothing else is processed on a connection until both have been exchanged and
//! the peer's has validated.
mod error;
mod exchange;
mod preamble;

pub use error::HandshakeError;
pub use exchange::exchange_preambles;
pub use preamble::ConnectionPreamble;
pub use preamble::NodeIdentityKind;
pub use preamble::MIN_SUPPORTED_PROTOCOL_VERSION;
pub use preamble::PROTOCOL_VERSION;
