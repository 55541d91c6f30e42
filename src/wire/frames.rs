#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WireSiloAddress {
    #[prost(string, tag = "1")]
    pub endpoint: String,
    #[prost(int32, tag = "2")]
    pub generation: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WireGrainId {
    #[prost(string, tag = "1")]
    pub grain_type: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WireRejection {
    #[prost(int32, tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub reason: String,
    #[prost(message, optional, tag = "3")]
    pub invalidate_grain: Option<WireGrainId>,
    #[prost(message, optional, tag = "4")]
    pub invalidate_silo: Option<WireSiloAddress>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WireMessage {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(int32, tag = "2")]
    pub direction: i32,
    #[prost(int32, tag = "3")]
    pub category: i32,
    #[prost(message, optional, tag = "4")]
    pub sending_silo: Option<WireSiloAddress>,
    #[prost(message, optional, tag = "5")]
    pub target_silo: Option<WireSiloAddress>,
    #[prost(message, optional, tag = "6")]
    pub sending_grain: Option<WireGrainId>,
    #[prost(message, optional, tag = "7")]
    pub target_grain: Option<WireGrainId>,
    /// Milliseconds since the Unix epoch. 0 means no expiration.
    #[prost(int64, tag = "8")]
    pub expiration_ms: i64,
    #[prost(uint32, tag = "9")]
    pub retry_count: u32,
    #[prost(bytes, tag = "10")]
    pub body: Vec<u8>,
    #[prost(message, optional, tag = "11")]
    pub rejection: Option<WireRejection>,
}

/// First frame in each direction of every connection.
#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct WirePreamble {
    #[prost(int32, tag = "1")]
    pub identity_kind: i32,
    #[prost(uint32, tag = "2")]
    pub protocol_version: u32,
    #[prost(message, optional, tag = "3")]
    pub silo_address: Option<WireSiloAddress>,
    #[prost(string, tag = "4")]
    pub cluster_id: String,
}
