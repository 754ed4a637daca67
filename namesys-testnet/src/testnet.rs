use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use namesys::{
    routing::{ContentRouting, Datastore, GetValueOptions, MemoryDatastore, ValueStore},
    Config, NameSystem, NameSystemBuilder, RoutingError,
};
use namesys_common::{KeyBook, Multihash, NamespacedValidator, ValidationError, Validator};
use tokio::sync::mpsc;

/// Replicas of [Testnet::default].
pub const DEFAULT_REPLICAS: usize = 3;

#[derive(Debug, Default)]
struct Replica {
    store: MemoryDatastore,
    offline: AtomicBool,
}

impl Replica {
    fn is_online(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Inner {
    replicas: Vec<Replica>,
    key_book: KeyBook,
    validator: NamespacedValidator,
    latency: Mutex<Duration>,
    failing_prefixes: RwLock<Vec<String>>,
    provided: Mutex<HashSet<Multihash>>,
    get_value_calls: AtomicUsize,
    put_value_calls: AtomicUsize,
}

/// A local routing network of in-memory replicas.
///
/// Cheap to clone, clones share the replicas and counters.
#[derive(Debug, Clone)]
pub struct Testnet {
    inner: Arc<Inner>,
}

impl Default for Testnet {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl Testnet {
    /// A network of `replicas` replicas, at least one.
    pub fn new(replicas: usize) -> Self {
        let key_book = KeyBook::default();

        Self {
            inner: Arc::new(Inner {
                replicas: (0..replicas.max(1)).map(|_| Replica::default()).collect(),
                validator: NamespacedValidator::with_key_book(key_book.clone()),
                key_book,
                latency: Mutex::new(Duration::ZERO),
                failing_prefixes: RwLock::new(Vec::new()),
                provided: Mutex::new(HashSet::new()),
                get_value_calls: AtomicUsize::new(0),
                put_value_calls: AtomicUsize::new(0),
            }),
        }
    }

    // === Getters ===

    /// Number of replicas.
    pub fn replicas(&self) -> usize {
        self.inner.replicas.len()
    }

    /// The store of replica `index`.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub fn replica(&self, index: usize) -> &MemoryDatastore {
        &self.inner.replicas[index].store
    }

    /// The key book the network validates hashed identities with.
    pub fn key_book(&self) -> &KeyBook {
        &self.inner.key_book
    }

    /// Number of [ValueStore::get_value] calls so far, searches included.
    pub fn get_value_calls(&self) -> usize {
        self.inner.get_value_calls.load(Ordering::SeqCst)
    }

    /// Number of [ValueStore::put_value] calls so far.
    pub fn put_value_calls(&self) -> usize {
        self.inner.put_value_calls.load(Ordering::SeqCst)
    }

    /// Whether `key` was announced through [ContentRouting::provide].
    pub fn is_provided(&self, key: &Multihash) -> bool {
        self.inner
            .provided
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key)
    }

    // === Faults ===

    /// Take replica `index` off (or back on) the network.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub fn set_offline(&self, index: usize, offline: bool) {
        self.inner.replicas[index]
            .offline
            .store(offline, Ordering::SeqCst);
    }

    /// Store `value` on replica `index` only, skipping validation.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub async fn put_raw(&self, index: usize, key: &str, value: Vec<u8>) {
        let _ = self.inner.replicas[index].store.put(key, value).await;
    }

    /// Fail every write to a key starting with `prefix`, e.g. `/pk/`.
    pub fn fail_puts_with_prefix(&self, prefix: &str) {
        self.inner
            .failing_prefixes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prefix.to_string());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self
            .inner
            .latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = latency;
    }

    // === Clients ===

    /// A [NameSystemBuilder] using this network for routing, a fresh local datastore and
    /// [Config::test] settings.
    pub fn name_system_builder(&self) -> NameSystemBuilder {
        let mut builder =
            NameSystem::builder(Arc::new(self.clone()), Arc::new(MemoryDatastore::default()));
        builder.config(&Config::test()).key_book(self.key_book().clone());
        builder
    }

    // === Private Methods ===

    async fn delay(&self) {
        let latency = *self
            .inner
            .latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn online(&self) -> impl Iterator<Item = &Replica> {
        self.inner.replicas.iter().filter(|r| r.is_online())
    }

    /// Values held by up to `quorum` online replicas, in replica order.
    async fn gather(&self, key: &str, quorum: usize) -> Result<Vec<Vec<u8>>, RoutingError> {
        let mut asked = 0;
        let mut values = Vec::new();

        for replica in self.online().take(quorum.max(1)) {
            asked += 1;
            match replica.store.get(key).await {
                Ok(Some(value)) => values.push(value),
                Ok(None) => {}
                Err(error) => tracing::debug!("Replica failed to read {key}: {error}"),
            }
        }

        if asked == 0 {
            return Err(RoutingError::Offline);
        }
        if values.is_empty() {
            return Err(RoutingError::NotFound(key.to_string()));
        }

        Ok(values)
    }

    /// The best of the `values` that validate.
    ///
    /// Invalid values are dropped before selecting, so a forged record on one replica
    /// cannot shadow valid ones on the others.
    fn winner(&self, key: &str, values: &[Vec<u8>]) -> Result<Vec<u8>, RoutingError> {
        let mut last_error = None;
        let valid: Vec<Vec<u8>> = values
            .iter()
            .filter(|value| match self.inner.validator.validate(key, value) {
                Ok(()) => true,
                Err(error) => {
                    tracing::debug!("Dropping invalid value for {key}: {error}");
                    last_error = Some(error);
                    false
                }
            })
            .cloned()
            .collect();

        if valid.is_empty() {
            return Err(last_error
                .unwrap_or(ValidationError::NoUsableRecords)
                .into());
        }

        let index = self.inner.validator.select(key, &valid)?;
        valid
            .get(index)
            .cloned()
            .ok_or(RoutingError::Rejected(ValidationError::NoUsableRecords))
    }
}

#[async_trait]
impl ValueStore for Testnet {
    async fn put_value(&self, key: &str, value: Vec<u8>) -> Result<(), RoutingError> {
        self.inner.put_value_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let failing = self
            .inner
            .failing_prefixes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));
        if failing {
            return Err(RoutingError::Transport(format!("injected failure for {key}")));
        }

        let mut stored = 0;
        for replica in self.online() {
            replica
                .store
                .put(key, value.clone())
                .await
                .map_err(|error| RoutingError::Transport(error.to_string()))?;
            stored += 1;
        }

        if stored == 0 {
            return Err(RoutingError::Offline);
        }

        tracing::debug!("Stored {key} on {stored} replicas");
        Ok(())
    }

    async fn get_value(
        &self,
        key: &str,
        options: &GetValueOptions,
    ) -> Result<Vec<u8>, RoutingError> {
        self.inner.get_value_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let values = self.gather(key, options.quorum).await?;
        self.winner(key, &values)
    }

    async fn search_value(
        &self,
        key: &str,
        options: &GetValueOptions,
    ) -> Result<mpsc::Receiver<Vec<u8>>, RoutingError> {
        self.inner.get_value_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let values = self.gather(key, options.quorum).await?;

        // Replay the answers as they would arrive, sending each new valid winner.
        let (tx, rx) = mpsc::channel(values.len());
        let mut best: Option<Vec<u8>> = None;
        let mut last_error = None;
        for seen in 1..=values.len() {
            match self.winner(key, &values[..seen]) {
                Ok(winner) if best.as_ref() != Some(&winner) => {
                    let _ = tx.try_send(winner.clone());
                    best = Some(winner);
                }
                Ok(_) => {}
                Err(error) => last_error = Some(error),
            }
        }

        match (best, last_error) {
            (None, Some(error)) => Err(error),
            _ => Ok(rx),
        }
    }
}

#[async_trait]
impl ContentRouting for Testnet {
    async fn provide(&self, key: &Multihash) -> Result<(), RoutingError> {
        self.delay().await;

        if self.online().next().is_none() {
            return Err(RoutingError::Offline);
        }

        self.inner
            .provided
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(*key);
        Ok(())
    }
}
