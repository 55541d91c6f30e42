use crate::link::LinkError;
use crate::message::{Message, RejectionKind};

/// Router is what a link hands messages to once it has decided what to do with them. It owns
/// local dispatch, picking the link for a given peer, and turning failures into responses.
///
/// Every method is an enqueue; none of them may block the calling link.
pub trait Router: Send + Sync {
    /// Sees every inbound message that got past probe handling, before any other decision.
    fn sniff_incoming_message(&self, message: &Message);

    /// Route `message` to its target, possibly over a different link.
    fn send_message(&self, message: Message);

    /// Dispatch `message` to an activation on this silo.
    fn receive_message(&self, message: Message);

    /// Answer `message` with a rejection instead of a response.
    fn send_rejection(&self, message: Message, kind: RejectionKind, reason: String, cause: Option<LinkError>);

    /// True while this silo is draining and refuses new application work.
    fn is_blocking_application_messages(&self) -> bool;
}

/// Builds the rejection response a router sends for `send_rejection`, attaching the cause's
/// cache-invalidation hint when there is one.
pub fn build_rejection(message: &Message, kind: RejectionKind, reason: String, cause: Option<&LinkError>) -> Message {
    let hint = cause.and_then(LinkError::cache_invalidation_hint);
    let reason = match cause {
        Some(cause) => format!("{} ({})", reason, cause),
        None => reason,
    };

    message.create_rejection(kind, reason, hint)
}
