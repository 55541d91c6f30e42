use crate::handshake::HandshakeError;
use crate::message::CacheInvalidationHint;
use crate::types::{GrainId, SiloAddress};
use crate::wire::WireError;
use std::net::SocketAddr;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("Message targets {target}, which is an earlier incarnation of local silo {local}")]
    StaleTarget {
        grain: Option<GrainId>,
        target: SiloAddress,
        local: SiloAddress,
    },
    #[error("Transient send failure: {0}")]
    TransientSend(String),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] WireError),
    #[error("Link closed: {0}")]
    Closed(String),
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: SocketAddr, reason: String },
    #[error("Giving up after {retries} retries, last failure: {cause}")]
    RetriesExhausted { retries: u32, cause: Box<LinkError> },
}

impl LinkError {
    /// The cached location the original sender should forget, if this failure implies one.
    pub fn cache_invalidation_hint(&self) -> Option<CacheInvalidationHint> {
        match self {
            LinkError::StaleTarget { grain, target, .. } => Some(CacheInvalidationHint {
                grain_id: grain.clone(),
                silo: *target,
            }),
            LinkError::RetriesExhausted { cause, .. } => cause.cache_invalidation_hint(),
            _ => None,
        }
    }
}
