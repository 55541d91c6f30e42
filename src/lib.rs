mod directory;
mod handshake;
mod link;
mod message;
mod options;
mod resilience;
mod time;
mod types;
mod wire;

pub use directory::DirectoryConfig;
pub use directory::DirectoryError;
pub use directory::DirectoryStore;
pub use directory::EntryVersion;
pub use directory::GrainDirectory;
pub use directory::InMemoryDirectoryStore;
pub use directory::RegisterOutcome;
pub use directory::StoreError;
pub use handshake::exchange_preambles;
pub use handshake::ConnectionPreamble;
pub use handshake::HandshakeError;
pub use handshake::NodeIdentityKind;
pub use handshake::MIN_SUPPORTED_PROTOCOL_VERSION;
pub use handshake::PROTOCOL_VERSION;
pub use link::build_rejection;
pub use link::close_signal;
pub use link::connect_link;
pub use link::spawn_link;
pub use link::CloseHandle;
pub use link::CloseSignal;
pub use link::LinkConfig;
pub use link::LinkError;
pub use link::LinkHandle;
pub use link::LinkListener;
pub use link::LinkState;
pub use link::LinkStatistics;
pub use link::Router;
pub use message::CacheInvalidationHint;
pub use message::Category;
pub use message::CorrelationId;
pub use message::Direction;
pub use message::Message;
pub use message::Rejection;
pub use message::RejectionKind;
pub use message::PING_COMPLETED;
pub use options::DirectoryOptions;
pub use options::DirectoryOptionsValidated;
pub use options::LinkOptions;
pub use options::LinkOptionsValidated;
pub use options::OptionsError;
pub use resilience::BackoffPolicy;
pub use resilience::ErrorFilter;
pub use resilience::ExponentialBackoff;
pub use resilience::FilterError;
pub use resilience::FixedBackoff;
pub use resilience::NoBackoff;
pub use resilience::OnExhausted;
pub use resilience::Retrier;
pub use resilience::RetryError;
pub use resilience::SuccessFilter;
pub use time::Clock;
pub use time::RealClock;
pub use types::ActivationId;
pub use types::GrainAddress;
pub use types::GrainId;
pub use types::MembershipVersion;
pub use types::SiloAddress;
pub use wire::WireError;
