use crate::message::{CacheInvalidationHint, Category, CorrelationId, Direction, Message, Rejection, RejectionKind};
use crate::types::{GrainId, SiloAddress};
use crate::wire::frames::{WireGrainId, WireMessage, WireRejection, WireSiloAddress};
use bytes::{Bytes, BytesMut};
use chrono::{TimeZone, Utc};
use prost::Message as _;
use std::convert::TryFrom;
use std::net::SocketAddr;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },
}

pub(crate) fn encode_message(message: &Message) -> Result<Bytes, WireError> {
    encode_frame(&WireMessage::from(message))
}

pub(crate) fn decode_message(frame: Bytes) -> Result<Message, WireError> {
    let wire = WireMessage::decode(frame)?;
    Message::try_from(wire)
}

pub(crate) fn encode_frame<M: prost::Message>(wire: &M) -> Result<Bytes, WireError> {
    let mut buf = BytesMut::with_capacity(wire.encoded_len());
    wire.encode(&mut buf)?;
    Ok(buf.freeze())
}

pub(crate) fn silo_address_to_wire(silo: &SiloAddress) -> WireSiloAddress {
    WireSiloAddress {
        endpoint: silo.endpoint().to_string(),
        generation: silo.generation(),
    }
}

pub(crate) fn silo_address_from_wire(wire: WireSiloAddress) -> Result<SiloAddress, WireError> {
    let endpoint = wire
        .endpoint
        .parse::<SocketAddr>()
        .map_err(|_| WireError::InvalidValue {
            field: "endpoint",
            value: wire.endpoint.clone(),
        })?;

    Ok(SiloAddress::new(endpoint, wire.generation))
}

fn grain_id_to_wire(grain_id: &GrainId) -> WireGrainId {
    WireGrainId {
        grain_type: grain_id.grain_type().to_string(),
        key: grain_id.key().to_string(),
    }
}

fn grain_id_from_wire(wire: WireGrainId) -> GrainId {
    GrainId::new(wire.grain_type, wire.key)
}

fn opt_silo_from_wire(wire: Option<WireSiloAddress>) -> Result<Option<SiloAddress>, WireError> {
    wire.map(silo_address_from_wire).transpose()
}

// ------- Enum mappings --------

fn direction_to_wire(direction: Direction) -> i32 {
    match direction {
        Direction::Request => 1,
        Direction::Response => 2,
        Direction::OneWay => 3,
    }
}

fn direction_from_wire(value: i32) -> Result<Direction, WireError> {
    match value {
        1 => Ok(Direction::Request),
        2 => Ok(Direction::Response),
        3 => Ok(Direction::OneWay),
        other => Err(WireError::InvalidValue {
            field: "direction",
            value: other.to_string(),
        }),
    }
}

fn category_to_wire(category: Category) -> i32 {
    match category {
        Category::System => 1,
        Category::Application => 2,
        Category::Ping => 3,
    }
}

fn category_from_wire(value: i32) -> Result<Category, WireError> {
    match value {
        1 => Ok(Category::System),
        2 => Ok(Category::Application),
        3 => Ok(Category::Ping),
        other => Err(WireError::InvalidValue {
            field: "category",
            value: other.to_string(),
        }),
    }
}

fn rejection_kind_to_wire(kind: RejectionKind) -> i32 {
    match kind {
        RejectionKind::Transient => 1,
        RejectionKind::Overloaded => 2,
        RejectionKind::Unrecoverable => 3,
        RejectionKind::CacheInvalidation => 4,
    }
}

fn rejection_kind_from_wire(value: i32) -> Result<RejectionKind, WireError> {
    match value {
        1 => Ok(RejectionKind::Transient),
        2 => Ok(RejectionKind::Overloaded),
        3 => Ok(RejectionKind::Unrecoverable),
        4 => Ok(RejectionKind::CacheInvalidation),
        other => Err(WireError::InvalidValue {
            field: "rejection.kind",
            value: other.to_string(),
        }),
    }
}

// ------- Conversions --------

impl From<&Rejection> for WireRejection {
    fn from(rejection: &Rejection) -> Self {
        let (invalidate_grain, invalidate_silo) = match &rejection.cache_invalidation {
            Some(hint) => (
                hint.grain_id.as_ref().map(grain_id_to_wire),
                Some(silo_address_to_wire(&hint.silo)),
            ),
            None => (None, None),
        };

        WireRejection {
            kind: rejection_kind_to_wire(rejection.kind),
            reason: rejection.reason.clone(),
            invalidate_grain,
            invalidate_silo,
        }
    }
}

impl TryFrom<WireRejection> for Rejection {
    type Error = WireError;

    fn try_from(wire: WireRejection) -> Result<Self, Self::Error> {
        let cache_invalidation = match wire.invalidate_silo {
            Some(silo) => Some(CacheInvalidationHint {
                grain_id: wire.invalidate_grain.map(grain_id_from_wire),
                silo: silo_address_from_wire(silo)?,
            }),
            None => None,
        };

        Ok(Rejection {
            kind: rejection_kind_from_wire(wire.kind)?,
            reason: wire.reason,
            cache_invalidation,
        })
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        WireMessage {
            id: message.id.as_u64(),
            direction: direction_to_wire(message.direction),
            category: category_to_wire(message.category),
            sending_silo: message.sending_silo.as_ref().map(silo_address_to_wire),
            target_silo: message.target_silo.as_ref().map(silo_address_to_wire),
            sending_grain: message.sending_grain.as_ref().map(grain_id_to_wire),
            target_grain: message.target_grain.as_ref().map(grain_id_to_wire),
            expiration_ms: message.expiration.map(|e| e.timestamp_millis()).unwrap_or(0),
            retry_count: message.retry_count,
            body: message.body.to_vec(),
            rejection: message.rejection.as_ref().map(WireRejection::from),
        }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = WireError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let expiration = match wire.expiration_ms {
            0 => None,
            ms => Some(
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or_else(|| WireError::InvalidValue {
                        field: "expiration_ms",
                        value: ms.to_string(),
                    })?,
            ),
        };

        Ok(Message {
            id: CorrelationId::new(wire.id),
            direction: direction_from_wire(wire.direction)?,
            category: category_from_wire(wire.category)?,
            sending_silo: opt_silo_from_wire(wire.sending_silo)?,
            target_silo: opt_silo_from_wire(wire.target_silo)?,
            sending_grain: wire.sending_grain.map(grain_id_from_wire),
            target_grain: wire.target_grain.map(grain_id_from_wire),
            expiration,
            retry_count: wire.retry_count,
            body: Bytes::from(wire.body),
            rejection: wire.rejection.map(Rejection::try_from).transpose()?,
        })
    }
}
