use chrono::Utc;
use std::fmt;
use std::net::SocketAddr;

/// SiloAddress is the identity of one incarnation of a silo: the network endpoint it listens on,
/// plus the generation it was started with. A silo restarted on the same endpoint gets a new
/// generation, so anything still holding the old address is holding a stale reference.
///
/// Equality considers both parts. Use [`SiloAddress::is_same_endpoint`] when only the endpoint
/// matters.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct SiloAddress {
    endpoint: SocketAddr,
    generation: i32,
}

impl SiloAddress {
    pub fn new(endpoint: SocketAddr, generation: i32) -> Self {
        SiloAddress { endpoint, generation }
    }

    /// Create an address with a fresh generation derived from the wall clock.
    pub fn new_incarnation(endpoint: SocketAddr) -> Self {
        Self::new(endpoint, Self::allocate_generation())
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn generation(&self) -> i32 {
        self.generation
    }

    pub fn is_same_endpoint(&self, other: &SiloAddress) -> bool {
        self.endpoint == other.endpoint
    }

    /// True if `self` points at the same endpoint as `current` but at a different incarnation.
    pub fn is_stale_relative_to(&self, current: &SiloAddress) -> bool {
        self.is_same_endpoint(current) && self.generation != current.generation
    }

    // Seconds since 2022-01-01T00:00:00Z, which keeps the value within i32 for decades.
    fn allocate_generation() -> i32 {
        const GENERATION_EPOCH_SECS: i64 = 1_640_995_200;
        let elapsed = Utc::now().timestamp() - GENERATION_EPOCH_SECS;
        elapsed.max(1) as i32
    }
}

impl fmt::Display for SiloAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}@{}", self.endpoint, self.generation)
    }
}

impl fmt::Debug for SiloAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
