//! Grain id -> owning activation. Ownership is decided only by compare-and-swap against the
//! backing store; losing a registration race is a normal outcome, not an error.
mod grain_directory;
mod in_memory;
mod store;

pub use grain_directory::DirectoryConfig;
pub use grain_directory::DirectoryError;
pub use grain_directory::GrainDirectory;
pub use grain_directory::RegisterOutcome;
pub use in_memory::InMemoryDirectoryStore;
pub use store::DirectoryStore;
pub use store::EntryVersion;
pub use store::StoreError;
