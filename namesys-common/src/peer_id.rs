//! Self-certifying identities derived from public keys.

use core::fmt;
use core::str::FromStr;

use crate::{
    crypto::{public_key_from_bytes, PublicKey},
    multihash::{self, HashCode, Multihash},
};

/// Routing namespace of name records.
pub const IPNS_NAMESPACE: &str = "ipns";
/// Routing namespace of published public keys.
pub const PK_NAMESPACE: &str = "pk";

/// How a [PeerId] is derived from a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdFormat {
    /// The public key is embedded in the identity and can be extracted again.
    #[default]
    Inline,
    /// The identity is a blake3 hash of the public key.
    Hashed,
}

impl FromStr for IdFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(IdFormat::Inline),
            "hashed" => Ok(IdFormat::Hashed),
            other => Err(format!("unknown identity format: {other}")),
        }
    }
}

/// Canonical identifier of a signer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Multihash);

impl PeerId {
    /// Derive the identity of `public_key`.
    pub fn from_public_key(public_key: &PublicKey, format: IdFormat) -> Self {
        match format {
            IdFormat::Inline => Self(Multihash::wrap(
                HashCode::Identity,
                *public_key.as_bytes(),
            )),
            IdFormat::Hashed => Self(Multihash::blake3(public_key.as_bytes())),
        }
    }

    /// The format this identity was derived with.
    pub fn format(&self) -> IdFormat {
        match self.0.code() {
            HashCode::Identity => IdFormat::Inline,
            HashCode::Blake3 => IdFormat::Hashed,
        }
    }

    /// Recover the public key from an inline identity.
    ///
    /// Returns `None` for hashed identities or if the inlined bytes are not a valid key.
    pub fn extract_public_key(&self) -> Option<PublicKey> {
        match self.0.code() {
            HashCode::Identity => public_key_from_bytes(self.0.digest()),
            HashCode::Blake3 => None,
        }
    }

    /// Whether `public_key` derives to this identity.
    pub fn matches_public_key(&self, public_key: &PublicKey) -> bool {
        Self::from_public_key(public_key, self.format()) == *self
    }

    /// The underlying [Multihash].
    pub const fn as_multihash(&self) -> &Multihash {
        &self.0
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Parse the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, multihash::Error> {
        Multihash::from_bytes(bytes).map(Self)
    }
}

impl From<Multihash> for PeerId {
    fn from(value: Multihash) -> Self {
        Self(value)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_z32())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PeerId").field(&self.to_string()).finish()
    }
}

impl FromStr for PeerId {
    type Err = multihash::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Multihash::from_z32(s).map(Self)
    }
}

/// Routing keys of an identity: `(public key key, name record key)`.
pub fn record_keys_for_id(id: &PeerId) -> (String, String) {
    (
        format!("/{PK_NAMESPACE}/{id}"),
        format!("/{IPNS_NAMESPACE}/{id}"),
    )
}
