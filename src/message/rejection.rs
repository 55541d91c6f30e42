use crate::types::{GrainId, SiloAddress};
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RejectionKind {
    /// Worth retrying; the condition is expected to clear up.
    Transient,
    Overloaded,
    /// Retrying the same message will not help.
    Unrecoverable,
    /// The sender routed on a stale directory entry and must drop it before retrying.
    CacheInvalidation,
}

/// Tells the original sender which cached grain location is no longer valid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CacheInvalidationHint {
    pub grain_id: Option<GrainId>,
    pub silo: SiloAddress,
}

impl fmt::Display for CacheInvalidationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.grain_id {
            Some(grain_id) => write!(f, "{} on {}", grain_id, self.silo),
            None => write!(f, "{}", self.silo),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
    pub cache_invalidation: Option<CacheInvalidationHint>,
}
