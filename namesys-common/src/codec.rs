//! Protobuf schema of the [crate::Record] wire format.
//!
//! Every field is optional on the wire so records written by other implementations,
//! with fields missing or unknown fields added, still decode.

use prost::Message;

/// The record as it travels through the routing substrate.
#[derive(Clone, PartialEq, Message)]
pub struct IpnsEntry {
    /// Target path bytes.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub value: Option<Vec<u8>>,
    /// ed25519 signature over the signable fields.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub signature: Option<Vec<u8>>,
    /// How `validity` is interpreted.
    #[prost(enumeration = "WireValidityType", optional, tag = "3")]
    pub validity_type: Option<i32>,
    /// RFC3339 end-of-life for [WireValidityType::Eol].
    #[prost(bytes = "vec", optional, tag = "4")]
    pub validity: Option<Vec<u8>>,
    /// Record version.
    #[prost(uint64, optional, tag = "5")]
    pub sequence: Option<u64>,
    /// Suggested cache lifetime in nanoseconds.
    #[prost(uint64, optional, tag = "6")]
    pub ttl: Option<u64>,
    /// Signer key, for names that do not inline it.
    #[prost(bytes = "vec", optional, tag = "7")]
    pub public_key: Option<Vec<u8>>,
}

/// Known values of [IpnsEntry::validity_type].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WireValidityType {
    /// End-of-life instant.
    Eol = 0,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Error decoding a record.
pub enum DecodeError {
    #[error("Malformed protobuf: {0}")]
    /// The bytes are not a valid protobuf message
    Protobuf(#[from] prost::DecodeError),
    #[error("Required field `{0}` is missing")]
    /// A required field was not present
    MissingField(&'static str),
}

/// Decode `bytes` into an [IpnsEntry].
pub fn decode_entry(bytes: &[u8]) -> Result<IpnsEntry, DecodeError> {
    Ok(IpnsEntry::decode(bytes)?)
}
