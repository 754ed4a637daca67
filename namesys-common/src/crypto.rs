//! Key types used to sign and verify name records.

pub use pkarr::{Keypair, PublicKey};

pub use ed25519_dalek::Signature;

/// Length in bytes of an ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Parse raw ed25519 public key bytes.
pub fn public_key_from_bytes(bytes: &[u8]) -> Option<PublicKey> {
    let bytes: &[u8; PUBLIC_KEY_LENGTH] = bytes.try_into().ok()?;
    PublicKey::try_from(bytes).ok()
}

/// Parse a signature from raw bytes, `None` if the length is wrong.
pub fn signature_from_bytes(bytes: &[u8]) -> Option<Signature> {
    Signature::try_from(bytes).ok()
}
