use crate::message::{CacheInvalidationHint, Rejection, RejectionKind};
use crate::types::{GrainId, SiloAddress};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Body of the reply to a probe that reached the silo it was addressed to.
pub const PING_COMPLETED: &[u8] = b"PONG";

/// Correlates a response with the request that caused it.
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(id: u64) -> Self {
        CorrelationId(id)
    }

    /// Next id from a process-wide counter.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CorrelationId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Request,
    Response,
    OneWay,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Category {
    /// Runtime-internal traffic. Never blocked while the silo drains.
    System,
    Application,
    /// Liveness probe. Answered by the link itself, never dispatched.
    Ping,
}

/// Message is the envelope carried by every application frame on a link.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: CorrelationId,
    pub direction: Direction,
    pub category: Category,
    pub sending_silo: Option<SiloAddress>,
    pub target_silo: Option<SiloAddress>,
    pub sending_grain: Option<GrainId>,
    pub target_grain: Option<GrainId>,
    pub expiration: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub body: Bytes,
    /// Set only on responses that reject the original request.
    pub rejection: Option<Rejection>,
}

impl Message {
    pub fn new(direction: Direction, category: Category, body: Bytes) -> Self {
        Message {
            id: CorrelationId::next(),
            direction,
            category,
            sending_silo: None,
            target_silo: None,
            sending_grain: None,
            target_grain: None,
            expiration: None,
            retry_count: 0,
            body,
            rejection: None,
        }
    }

    pub fn request(target_grain: GrainId, body: Bytes) -> Self {
        Message {
            target_grain: Some(target_grain),
            ..Self::new(Direction::Request, Category::Application, body)
        }
    }

    pub fn one_way(target_grain: GrainId, body: Bytes) -> Self {
        Message {
            target_grain: Some(target_grain),
            ..Self::new(Direction::OneWay, Category::Application, body)
        }
    }

    /// A liveness probe addressed at one specific incarnation of a silo.
    pub fn ping(target_silo: SiloAddress) -> Self {
        Message {
            target_silo: Some(target_silo),
            ..Self::new(Direction::Request, Category::Ping, Bytes::new())
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A probe request. Probe acknowledgements are ordinary responses.
    pub fn is_ping(&self) -> bool {
        self.category == Category::Ping && self.direction == Direction::Request
    }

    /// Only application traffic is subject to drain rejection.
    pub fn is_application(&self) -> bool {
        self.category == Category::Application
    }

    /// Response skeleton addressed back at the sender, keeping the correlation id.
    pub fn create_response(&self, body: Bytes) -> Message {
        Message {
            id: self.id,
            direction: Direction::Response,
            category: self.category,
            sending_silo: self.target_silo,
            target_silo: self.sending_silo,
            sending_grain: self.target_grain.clone(),
            target_grain: self.sending_grain.clone(),
            expiration: self.expiration,
            retry_count: 0,
            body,
            rejection: None,
        }
    }

    pub fn create_rejection(
        &self,
        kind: RejectionKind,
        reason: String,
        cache_invalidation: Option<CacheInvalidationHint>,
    ) -> Message {
        let mut response = self.create_response(Bytes::new());
        response.rejection = Some(Rejection {
            kind,
            reason,
            cache_invalidation,
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::net::SocketAddr;

    #[test]
    fn expiration_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let mut message = Message::request(GrainId::new("counter", "a"), Bytes::new());
        assert!(!message.is_expired_at(now));

        message.expiration = Some(now);
        assert!(message.is_expired_at(now));

        message.expiration = Some(now + Duration::seconds(5));
        assert!(!message.is_expired_at(now));
    }

    #[test]
    fn probe_ack_is_not_a_probe() {
        let silo = SiloAddress::new(SocketAddr::from(([127, 0, 0, 1], 1000)), 1);
        let ping = Message::ping(silo);

        let ack = ping.create_response(Bytes::from_static(PING_COMPLETED));

        assert!(ping.is_ping());
        assert!(!ack.is_ping());
        assert_eq!(ack.category, Category::Ping);
    }

    #[test]
    fn response_mirrors_addresses() {
        let a = SiloAddress::new(SocketAddr::from(([127, 0, 0, 1], 1000)), 1);
        let b = SiloAddress::new(SocketAddr::from(([127, 0, 0, 1], 2000)), 1);
        let mut request = Message::request(GrainId::new("counter", "a"), Bytes::from_static(b"add"));
        request.sending_silo = Some(a);
        request.target_silo = Some(b);
        request.sending_grain = Some(GrainId::new("client", "1"));
        request.retry_count = 2;

        let response = request.create_rejection(RejectionKind::Transient, "busy".to_string(), None);

        assert_eq!(response.id, request.id);
        assert_eq!(response.direction, Direction::Response);
        assert_eq!(response.sending_silo, Some(b));
        assert_eq!(response.target_silo, Some(a));
        assert_eq!(response.target_grain, Some(GrainId::new("client", "1")));
        assert_eq!(response.retry_count, 0);
        assert_eq!(response.rejection.map(|r| r.kind), Some(RejectionKind::Transient));
    }
}
