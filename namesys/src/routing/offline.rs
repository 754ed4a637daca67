use std::sync::Arc;

use async_trait::async_trait;
use namesys_common::{KeyBook, Multihash, NamespacedValidator, Validator};

use super::{ContentRouting, Datastore, GetValueOptions, ValueStore};
use crate::errors::RoutingError;

/// A [ValueStore] that never leaves the local [Datastore].
///
/// Used for `local_only` resolution and for publishing while disconnected. Values are
/// validated on the way in and out, and providing content always fails with
/// [RoutingError::Offline].
#[derive(Debug, Clone)]
pub struct OfflineRouter {
    datastore: Arc<dyn Datastore>,
    key_book: KeyBook,
    validator: NamespacedValidator,
}

impl OfflineRouter {
    /// Router over `datastore` with a fresh [KeyBook].
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self::with_key_book(datastore, KeyBook::default())
    }

    /// Router over `datastore` validating hashed identities with `key_book`.
    pub fn with_key_book(datastore: Arc<dyn Datastore>, key_book: KeyBook) -> Self {
        Self {
            datastore,
            validator: NamespacedValidator::with_key_book(key_book.clone()),
            key_book,
        }
    }

    /// The key book used to validate records of hashed identities.
    pub fn key_book(&self) -> &KeyBook {
        &self.key_book
    }
}

#[async_trait]
impl ValueStore for OfflineRouter {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<(), RoutingError> {
        self.validator.validate(key, &value)?;

        self.datastore
            .put(key, value)
            .await
            .map_err(|error| RoutingError::Transport(error.to_string()))
    }

    async fn get_value(
        &self,
        key: &str,
        _options: &GetValueOptions,
    ) -> Result<Vec<u8>, RoutingError> {
        let value = self
            .datastore
            .get(key)
            .await
            .map_err(|error| RoutingError::Transport(error.to_string()))?
            .ok_or_else(|| RoutingError::NotFound(key.to_string()))?;

        self.validator.validate(key, &value)?;

        Ok(value)
    }
}

#[async_trait]
impl ContentRouting for OfflineRouter {
    async fn provide(&self, _key: &Multihash) -> Result<(), RoutingError> {
        Err(RoutingError::Offline)
    }
}
