//! Local cache of public keys for identities that do not inline them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{crypto::PublicKey, peer_id::PeerId};

/// Thread-safe `PeerId -> PublicKey` map.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct KeyBook {
    keys: Arc<RwLock<HashMap<PeerId, PublicKey>>>,
}

impl KeyBook {
    /// Public key of `id`, extracted from the id itself when it is inline.
    pub fn public_key(&self, id: &PeerId) -> Option<PublicKey> {
        if let Some(public_key) = id.extract_public_key() {
            return Some(public_key);
        }

        self.keys
            .read()
            .ok()
            .and_then(|keys| keys.get(id).cloned())
    }

    /// Remember `public_key` for `id`.
    ///
    /// Returns `false` (and stores nothing) if the key does not derive to `id`.
    pub fn add(&self, id: PeerId, public_key: PublicKey) -> bool {
        if !id.matches_public_key(&public_key) {
            return false;
        }

        if let Ok(mut keys) = self.keys.write() {
            keys.insert(id, public_key);
        }

        true
    }

    /// Number of stored (non-inline) keys.
    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or_default()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
