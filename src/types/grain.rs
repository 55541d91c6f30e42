use crate::types::SiloAddress;
use std::fmt;
use std::sync::Arc;

/// GrainId is the stable logical identity of a grain: its type plus a key within that type.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct GrainId {
    grain_type: Arc<str>,
    key: Arc<str>,
}

impl GrainId {
    pub fn new(grain_type: impl Into<Arc<str>>, key: impl Into<Arc<str>>) -> Self {
        GrainId {
            grain_type: grain_type.into(),
            key: key.into(),
        }
    }

    pub fn grain_type(&self) -> &str {
        &self.grain_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for GrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.grain_type, self.key)
    }
}

impl fmt::Debug for GrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// ActivationId identifies one concrete instance of a grain. A new one is generated every time a
/// grain is activated.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct ActivationId(u128);

impl ActivationId {
    pub fn new() -> Self {
        ActivationId(rand::random())
    }

    pub fn from_u128(id: u128) -> Self {
        ActivationId(id)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Debug for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:032x}", self.0)
    }
}

/// Cluster membership version. Carried on directory entries as metadata only; it never decides
/// which entry wins.
#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct MembershipVersion(u64);

impl MembershipVersion {
    pub fn new(version: u64) -> Self {
        MembershipVersion(version)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        MembershipVersion(self.0 + 1)
    }
}

impl fmt::Debug for MembershipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// GrainAddress is one directory entry: which activation of a grain lives on which silo.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct GrainAddress {
    pub grain_id: GrainId,
    pub activation_id: ActivationId,
    pub silo_address: SiloAddress,
    pub membership_version: MembershipVersion,
}

impl GrainAddress {
    /// Address for a brand new activation of `grain_id` on `silo_address`.
    pub fn new_activation(
        grain_id: GrainId,
        silo_address: SiloAddress,
        membership_version: MembershipVersion,
    ) -> Self {
        GrainAddress {
            grain_id,
            activation_id: ActivationId::new(),
            silo_address,
            membership_version,
        }
    }
}
