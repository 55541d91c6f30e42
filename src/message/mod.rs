mod envelope;
mod rejection;

pub use envelope::Category;
pub use envelope::CorrelationId;
pub use envelope::Direction;
pub use envelope::Message;
pub use envelope::PING_COMPLETED;
pub use rejection::CacheInvalidationHint;
pub use rejection::Rejection;
pub use rejection::RejectionKind;
