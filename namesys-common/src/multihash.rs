//! Self-describing 32-byte digests.
//!
//! Binary form is `code ‖ digest` (33 bytes), text form is z-base32 of the binary form.
//! Both identities ([crate::PeerId]) and content references use this encoding.

use core::fmt;
use core::str::FromStr;

/// Length of the digest part of a [Multihash].
pub const DIGEST_LENGTH: usize = 32;

/// Length of the binary encoding of a [Multihash].
pub const ENCODED_LENGTH: usize = DIGEST_LENGTH + 1;

const ALPHABET: base32::Alphabet = base32::Alphabet::Z;

/// The function that produced a [Multihash] digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashCode {
    /// The digest is the input itself (used to inline ed25519 public keys).
    Identity,
    /// Blake3 with a 32-byte output.
    Blake3,
}

impl HashCode {
    /// The code byte prefixed to the digest.
    pub const fn code(self) -> u8 {
        match self {
            HashCode::Identity => 0x00,
            HashCode::Blake3 => 0x1e,
        }
    }

    /// Map a code byte back to a [HashCode].
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(HashCode::Identity),
            0x1e => Some(HashCode::Blake3),
            _ => None,
        }
    }
}

/// A tagged 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Multihash {
    code: HashCode,
    digest: [u8; DIGEST_LENGTH],
}

impl Multihash {
    /// Wrap an existing digest.
    pub const fn wrap(code: HashCode, digest: [u8; DIGEST_LENGTH]) -> Self {
        Self { code, digest }
    }

    /// Blake3 digest of `data`.
    pub fn blake3(data: &[u8]) -> Self {
        Self::wrap(HashCode::Blake3, *blake3::hash(data).as_bytes())
    }

    /// The hash function code.
    pub const fn code(&self) -> HashCode {
        self.code
    }

    /// The raw digest.
    pub const fn digest(&self) -> &[u8; DIGEST_LENGTH] {
        &self.digest
    }

    /// Binary encoding, `code ‖ digest`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_LENGTH);
        out.push(self.code.code());
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse the binary encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != ENCODED_LENGTH {
            return Err(Error::InvalidLength(bytes.len()));
        }
        let code = HashCode::from_code(bytes[0]).ok_or(Error::UnknownCode(bytes[0]))?;
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&bytes[1..]);
        Ok(Self { code, digest })
    }

    /// z-base32 text form.
    pub fn to_z32(&self) -> String {
        base32::encode(ALPHABET, &self.to_bytes())
    }

    /// Parse the z-base32 text form.
    pub fn from_z32(value: &str) -> Result<Self, Error> {
        let bytes = base32::decode(ALPHABET, value).ok_or(Error::InvalidEncoding)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_z32())
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Multihash").field(&self.to_z32()).finish()
    }
}

impl FromStr for Multihash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_z32(s)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Error parsing a [Multihash].
pub enum Error {
    #[error("Not valid z-base32")]
    /// Not valid z-base32
    InvalidEncoding,
    #[error("Expected {ENCODED_LENGTH} bytes, got {0}")]
    /// Wrong binary length
    InvalidLength(usize),
    #[error("Unknown hash code {0:#04x}")]
    /// Unknown hash code
    UnknownCode(u8),
}
