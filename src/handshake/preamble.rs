use crate::handshake::HandshakeError;
use crate::types::SiloAddress;
use crate::wire::{self, WireError, WirePreamble};
use bytes::Bytes;
use prost::Message as _;

/// Version written by this build.
pub const PROTOCOL_VERSION: u32 = 1;
/// Oldest peer version this build will talk to.
pub const MIN_SUPPORTED_PROTOCOL_VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeIdentityKind {
    /// A cluster member. Its preamble carries the silo address.
    Silo,
    /// A non-member client. Silo links refuse these.
    Client,
}

impl NodeIdentityKind {
    fn to_wire(self) -> i32 {
        match self {
            NodeIdentityKind::Silo => 1,
            NodeIdentityKind::Client => 2,
        }
    }

    fn from_wire(value: i32) -> Result<Self, HandshakeError> {
        match value {
            1 => Ok(NodeIdentityKind::Silo),
            2 => Ok(NodeIdentityKind::Client),
            other => Err(HandshakeError::UnrecognizedIdentityKind(other)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionPreamble {
    pub identity_kind: NodeIdentityKind,
    pub protocol_version: u32,
    pub silo_address: Option<SiloAddress>,
    pub cluster_id: String,
}

impl ConnectionPreamble {
    pub fn for_silo(silo_address: SiloAddress, cluster_id: impl Into<String>) -> Self {
        ConnectionPreamble {
            identity_kind: NodeIdentityKind::Silo,
            protocol_version: PROTOCOL_VERSION,
            silo_address: Some(silo_address),
            cluster_id: cluster_id.into(),
        }
    }

    pub fn for_client(cluster_id: impl Into<String>) -> Self {
        ConnectionPreamble {
            identity_kind: NodeIdentityKind::Client,
            protocol_version: PROTOCOL_VERSION,
            silo_address: None,
            cluster_id: cluster_id.into(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, HandshakeError> {
        let raw = WirePreamble {
            identity_kind: self.identity_kind.to_wire(),
            protocol_version: self.protocol_version,
            silo_address: self.silo_address.as_ref().map(wire::silo_address_to_wire),
            cluster_id: self.cluster_id.clone(),
        };

        Ok(wire::encode_frame(&raw)?)
    }

    pub fn decode(frame: Bytes) -> Result<Self, HandshakeError> {
        let raw = WirePreamble::decode(frame).map_err(WireError::from)?;

        Ok(ConnectionPreamble {
            identity_kind: NodeIdentityKind::from_wire(raw.identity_kind)?,
            protocol_version: raw.protocol_version,
            silo_address: raw.silo_address.map(wire::silo_address_from_wire).transpose()?,
            cluster_id: raw.cluster_id,
        })
    }

    /// Checks a peer's preamble against what this node expects of any peer.
    pub fn validate(&self, expected_cluster_id: &str) -> Result<(), HandshakeError> {
        if self.cluster_id != expected_cluster_id {
            return Err(HandshakeError::ClusterIdMismatch {
                expected: expected_cluster_id.to_string(),
                actual: self.cluster_id.clone(),
            });
        }

        if self.protocol_version < MIN_SUPPORTED_PROTOCOL_VERSION {
            return Err(HandshakeError::UnsupportedProtocolVersion {
                actual: self.protocol_version,
                minimum: MIN_SUPPORTED_PROTOCOL_VERSION,
            });
        }

        if self.identity_kind == NodeIdentityKind::Silo && self.silo_address.is_none() {
            return Err(HandshakeError::MissingSiloAddress);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn silo() -> SiloAddress {
        SiloAddress::new(SocketAddr::from(([10, 0, 0, 7], 11111)), 42)
    }

    #[test]
    fn silo_preamble_decodes_to_itself() {
        let preamble = ConnectionPreamble::for_silo(silo(), "prod-east");

        let decoded = ConnectionPreamble::decode(preamble.encode().unwrap()).unwrap();

        assert_eq!(decoded, preamble);
        assert_eq!(decoded.silo_address, Some(silo()));
    }

    #[test]
    fn unknown_identity_kind_is_rejected_at_decode() {
        let raw = WirePreamble {
            identity_kind: 9,
            protocol_version: PROTOCOL_VERSION,
            silo_address: None,
            cluster_id: "prod-east".to_string(),
        };
        let frame = wire::encode_frame(&raw).unwrap();

        match ConnectionPreamble::decode(frame) {
            Err(HandshakeError::UnrecognizedIdentityKind(9)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zero_identity_kind_is_unrecognized() {
        let frame = wire::encode_frame(&WirePreamble::default()).unwrap();

        assert!(matches!(
            ConnectionPreamble::decode(frame),
            Err(HandshakeError::UnrecognizedIdentityKind(0))
        ));
    }

    #[test]
    fn validate() {
        let good = ConnectionPreamble::for_silo(silo(), "prod-east");
        assert!(good.validate("prod-east").is_ok());

        match good.validate("prod-west") {
            Err(HandshakeError::ClusterIdMismatch { expected, actual }) => {
                assert_eq!(expected, "prod-west");
                assert_eq!(actual, "prod-east");
            }
            other => panic!("Unexpected result: {:?}", other),
        }

        let mut ancient = good.clone();
        ancient.protocol_version = 0;
        assert!(matches!(
            ancient.validate("prod-east"),
            Err(HandshakeError::UnsupportedProtocolVersion { actual: 0, .. })
        ));

        let mut anonymous_silo = good;
        anonymous_silo.silo_address = None;
        assert!(matches!(
            anonymous_silo.validate("prod-east"),
            Err(HandshakeError::MissingSiloAddress)
        ));

        assert!(ConnectionPreamble::for_client("prod-east").validate("prod-east").is_ok());
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let frame = ConnectionPreamble::for_silo(silo(), "prod-east").encode().unwrap();
        let truncated = frame.slice(..frame.len() - 3);

        assert!(matches!(
            ConnectionPreamble::decode(truncated),
            Err(HandshakeError::Malformed(WireError::Decode(_)))
        ));
    }
}
