mod grain;
mod silo_address;

pub use grain::ActivationId;
pub use grain::GrainAddress;
pub use grain::GrainId;
pub use grain::MembershipVersion;
pub use silo_address::SiloAddress;
