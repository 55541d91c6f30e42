use crate::types::{GrainAddress, GrainId};
use std::fmt;

/// Opaque token identifying one stored revision of an entry. Any write to an entry gives it a
/// new version.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct EntryVersion(u64);

impl EntryVersion {
    pub fn new(version: u64) -> Self {
        EntryVersion(version)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Worth retrying, e.g. a timeout or throttling.
    #[error("Transient store failure: {0}")]
    Transient(String),
    #[error("Store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// DirectoryStore is the durable backing store behind the grain directory. Every write is
/// conditional and must be atomic with respect to other writers of the same grain id.
///
/// CAS: the conditional methods return `Ok(true)` iff they mutated the store, and `Ok(false)`
/// when the condition did not hold.
#[async_trait::async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn read(&self, grain_id: &GrainId) -> Result<Option<(GrainAddress, EntryVersion)>, StoreError>;

    /// Store `entry` iff there is no entry for its grain id.
    async fn insert_if_absent(&self, entry: &GrainAddress) -> Result<bool, StoreError>;

    /// Overwrite the entry for `entry.grain_id` iff its current version is `expected`.
    async fn replace_if_version(&self, entry: &GrainAddress, expected: EntryVersion) -> Result<bool, StoreError>;

    /// Remove the entry for `grain_id` iff its current version is `expected`.
    async fn delete_if_version(&self, grain_id: &GrainId, expected: EntryVersion) -> Result<bool, StoreError>;
}
