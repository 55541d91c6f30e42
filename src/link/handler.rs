use crate::link::stats::LinkStats;
use crate::link::{LinkError, Router};
use crate::message::{Direction, Message, RejectionKind, PING_COMPLETED};
use crate::types::SiloAddress;
use std::sync::Arc;

/// What happened to one inbound message.
#[derive(Debug)]
pub(crate) enum InboundOutcome {
    /// Answered on this link directly; the reply must be written back to the peer.
    Reply(Message),
    Delivered,
    Forwarded,
    Rejected,
    Dropped(DropReason),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum DropReason {
    Expired,
    Draining,
    StaleTarget,
}

/// Per-message decisions for one link. Holds no connection state, so the connection task and
/// every handle to the link share one instance.
pub(crate) struct MessageHandler {
    logger: slog::Logger,
    local: SiloAddress,
    router: Arc<dyn Router>,
    stats: Arc<LinkStats>,
    max_retry_count: u32,
}

impl MessageHandler {
    pub(crate) fn new(
        logger: slog::Logger,
        local: SiloAddress,
        router: Arc<dyn Router>,
        stats: Arc<LinkStats>,
        max_retry_count: u32,
    ) -> Self {
        MessageHandler {
            logger,
            local,
            router,
            stats,
            max_retry_count,
        }
    }

    pub(crate) fn local(&self) -> SiloAddress {
        self.local
    }

    pub(crate) fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub(crate) fn handle_inbound(&self, message: Message) -> InboundOutcome {
        self.stats.record_received();

        if message.is_ping() {
            return self.handle_ping(message);
        }

        self.router.sniff_incoming_message(&message);

        if message.is_expired() {
            slog::debug!(self.logger, "Dropping expired message {:?}", message.id);
            return InboundOutcome::Dropped(DropReason::Expired);
        }

        if message.is_application() && self.router.is_blocking_application_messages() {
            return if message.direction == Direction::Request {
                slog::debug!(self.logger, "Rejecting request {:?} while draining", message.id);
                self.stats.record_rejection();
                self.router.send_rejection(
                    message,
                    RejectionKind::Transient,
                    "Silo is draining and unavailable for new requests".to_string(),
                    None,
                );
                InboundOutcome::Rejected
            } else {
                InboundOutcome::Dropped(DropReason::Draining)
            };
        }

        let target_silo = message.target_silo;
        let target = match target_silo {
            None => {
                self.router.receive_message(message);
                return InboundOutcome::Delivered;
            }
            Some(target) if target == self.local => {
                self.router.receive_message(message);
                return InboundOutcome::Delivered;
            }
            Some(target) => target,
        };

        if !target.is_same_endpoint(&self.local) {
            slog::debug!(self.logger, "Forwarding {:?} towards {}", message.id, target);
            self.router.send_message(message);
            return InboundOutcome::Forwarded;
        }

        // Same endpoint, different incarnation.
        if message.direction != Direction::Request {
            slog::debug!(self.logger, "Dropping {:?} addressed to stale {}", message.id, target);
            return InboundOutcome::Dropped(DropReason::StaleTarget);
        }

        let cause = LinkError::StaleTarget {
            grain: message.target_grain.clone(),
            target,
            local: self.local,
        };
        slog::info!(self.logger, "Rejecting request {:?}: {}", message.id, cause);
        self.stats.record_rejection();
        self.router.send_rejection(
            message,
            RejectionKind::Transient,
            "Target silo is no longer active".to_string(),
            Some(cause),
        );
        InboundOutcome::Rejected
    }

    fn handle_ping(&self, message: Message) -> InboundOutcome {
        match message.target_silo {
            Some(target) if target != self.local => {
                slog::warn!(self.logger, "Probe for {} arrived at {}", target, self.local);
                self.stats.record_rejection();
                let mut rejection = message.create_rejection(
                    RejectionKind::Unrecoverable,
                    format!("Probe targeted {}, but this silo is {}", target, self.local),
                    None,
                );
                rejection.sending_silo = Some(self.local);
                InboundOutcome::Reply(rejection)
            }
            _ => {
                self.stats.record_probe_answered();
                let mut ack = message.create_response(bytes::Bytes::from_static(PING_COMPLETED));
                ack.sending_silo = Some(self.local);
                InboundOutcome::Reply(ack)
            }
        }
    }

    /// Readies a message for the wire. `None` means it expired and was dropped.
    pub(crate) fn prepare_outbound(&self, mut message: Message, remote: &SiloAddress) -> Option<Message> {
        if message.is_expired() {
            slog::debug!(self.logger, "Dropping expired outbound message {:?}", message.id);
            self.stats.record_dropped_send();
            return None;
        }

        if message.sending_silo.is_none() {
            message.sending_silo = Some(self.local);
        }

        if let Some(target) = message.target_silo {
            if target != *remote {
                slog::warn!(
                    self.logger,
                    "Message {:?} targets {} but is being sent to {}",
                    message.id,
                    target,
                    remote
                );
            }
        }

        Some(message)
    }

    /// A message could not be sent. Requests get a transient rejection through the router so the
    /// caller hears back; anything else is counted and dropped.
    pub(crate) fn on_send_failure(&self, message: Message, cause: LinkError) {
        if message.direction == Direction::Request {
            slog::info!(self.logger, "Send of request {:?} failed: {}", message.id, cause);
            self.stats.record_rejection();
            self.router.send_rejection(
                message,
                RejectionKind::Transient,
                "Failed to send request".to_string(),
                Some(cause),
            );
        } else {
            slog::warn!(self.logger, "Dropping {:?} after failed send: {}", message.id, cause);
            self.stats.record_dropped_send();
        }
    }

    /// Resubmits a message for a fresh routing attempt, or gives up once it has been retried
    /// `max_retry_count` times.
    pub(crate) fn retry_message(&self, mut message: Message, cause: LinkError) {
        if message.retry_count < self.max_retry_count {
            message.retry_count += 1;
            slog::debug!(
                self.logger,
                "Retrying {:?} (retry {}) after: {}",
                message.id,
                message.retry_count,
                cause
            );
            self.router.send_message(message);
        } else {
            let retries = message.retry_count;
            self.on_send_failure(
                message,
                LinkError::RetriesExhausted {
                    retries,
                    cause: Box::new(cause),
                },
            );
        }
    }
}
