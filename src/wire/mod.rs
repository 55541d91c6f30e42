//! Protobuf payloads carried inside length-delimited frames, and their conversions to and from the
//! domain types. Nothing outside the crate sees these structs.
mod convert;
mod frames;

pub(crate) use convert::decode_message;
pub(crate) use convert::encode_frame;
pub(crate) use convert::encode_message;
pub(crate) use convert::silo_address_from_wire;
pub(crate) use convert::silo_address_to_wire;
pub(crate) use frames::WirePreamble;

pub use convert::WireError;
