//! The routing substrate contract consumed by the publisher and resolver, plus the local
//! (offline) implementation of it.

mod datastore;
mod offline;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use namesys_common::{
    crypto::PublicKey, record_keys_for_id, KeyBook, Multihash, PeerId, PublicKeyValidator,
    ValidationError, Validator,
};
use tokio::sync::mpsc;

use crate::errors::{Error, Result, RoutingError};

pub use datastore::{Datastore, FsDatastore, MemoryDatastore};
pub use offline::OfflineRouter;

/// Default number of matching replies a query waits for.
pub const DEFAULT_QUORUM: usize = 16;

/// Options of a single [ValueStore::get_value] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetValueOptions {
    /// Minimum number of replicas to hear from before the query is considered settled.
    pub quorum: usize,
}

impl Default for GetValueOptions {
    fn default() -> Self {
        Self {
            quorum: DEFAULT_QUORUM,
        }
    }
}

impl GetValueOptions {
    /// Options with the given quorum.
    pub fn with_quorum(quorum: usize) -> Self {
        Self { quorum }
    }
}

/// A distributed key/value store, e.g. a DHT.
///
/// Implementations validate values with their own validator on the way in and out;
/// callers still validate whatever they end up with.
#[async_trait]
pub trait ValueStore: Debug + Send + Sync {
    /// Store `value` under `key`.
    async fn put_value(&self, key: &str, value: Vec<u8>) -> std::result::Result<(), RoutingError>;

    /// The best value stored under `key`.
    async fn get_value(
        &self,
        key: &str,
        options: &GetValueOptions,
    ) -> std::result::Result<Vec<u8>, RoutingError>;

    /// Stream progressively better values for `key` as replicas answer.
    ///
    /// The last value received is the best one. The default implementation yields the
    /// single [ValueStore::get_value] result.
    async fn search_value(
        &self,
        key: &str,
        options: &GetValueOptions,
    ) -> std::result::Result<mpsc::Receiver<Vec<u8>>, RoutingError> {
        let value = self.get_value(key, options).await?;
        let (tx, rx) = mpsc::channel(1);
        // Cannot fail, the receiver is still alive and the buffer is empty.
        let _ = tx.try_send(value);
        Ok(rx)
    }
}

/// Content routing: announcing that this node can provide some content.
#[async_trait]
pub trait ContentRouting: Debug + Send + Sync {
    /// Announce `key` to the network.
    async fn provide(&self, key: &Multihash) -> std::result::Result<(), RoutingError>;
}

/// Public key of `id`, fetched from `/pk/<id>` if it is neither inline nor in `key_book`.
///
/// A fetched key is checked against `id` and remembered in `key_book`.
pub async fn get_public_key(
    store: &dyn ValueStore,
    key_book: &KeyBook,
    id: &PeerId,
    timeout: Option<Duration>,
) -> Result<PublicKey> {
    if let Some(public_key) = key_book.public_key(id) {
        return Ok(public_key);
    }

    let (pk_key, _) = record_keys_for_id(id);
    tracing::debug!("fetching public key for {id} from {pk_key}");

    let options = GetValueOptions::with_quorum(1);
    let lookup = store.get_value(&pk_key, &options);
    let value = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, lookup)
            .await
            .map_err(|_| Error::Timeout {
                operation: "public key lookup",
                timeout,
            })?,
        None => lookup.await,
    };

    let value = match value {
        Ok(value) => value,
        Err(RoutingError::NotFound(_)) => {
            return Err(ValidationError::PublicKeyNotFound.into());
        }
        Err(error) => return Err(error.into()),
    };

    PublicKeyValidator.validate(&pk_key, &value)?;

    let public_key = namesys_common::crypto::public_key_from_bytes(&value)
        .ok_or(ValidationError::BadPublicKey)?;
    key_book.add(*id, public_key.clone());

    Ok(public_key)
}
