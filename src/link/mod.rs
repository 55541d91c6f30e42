//! One bidirectional link to one peer silo: handshake, framing, probe answering, inbound
//! classification, forwarding, rejection and bounded retry.
mod connection;
mod connector;
mod error;
mod handler;
mod listener;
mod router;
mod signal;
mod state;
mod stats;

pub use connection::spawn_link;
pub use connection::LinkConfig;
pub use connection::LinkHandle;
pub use connector::connect_link;
pub use error::LinkError;
pub use listener::LinkListener;
pub use router::build_rejection;
pub use router::Router;
pub use signal::close_signal;
pub use signal::CloseHandle;
pub use signal::CloseSignal;
pub use state::LinkState;
pub use stats::LinkStatistics;
