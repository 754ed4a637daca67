//!
//! Builds, signs, sequences and stores name records.
//!

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use namesys_common::{
    crypto::Keypair, record_keys_for_id, timestamp::add_duration, IdFormat, Path, PeerId,
    Record, ValidationError,
};

use crate::{
    errors::{Error, Result},
    routing::{Datastore, GetValueOptions, ValueStore},
};

/// Lifetime of a record published without an explicit end-of-life.
pub const DEFAULT_RECORD_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Bound on the network lookup of the previous sequence number.
pub const DEFAULT_SEQUENCE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on each write to the routing substrate.
pub const DEFAULT_PUT_VALUE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for creating a [Publisher].
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub(crate) record_lifetime: Duration,
    pub(crate) identity_format: IdFormat,
    pub(crate) sequence_lookup_timeout: Duration,
    pub(crate) put_value_timeout: Duration,
}

impl PublisherSettings {
    /// Default settings.
    pub fn new() -> Self {
        Self {
            record_lifetime: DEFAULT_RECORD_LIFETIME,
            identity_format: IdFormat::Inline,
            sequence_lookup_timeout: DEFAULT_SEQUENCE_LOOKUP_TIMEOUT,
            put_value_timeout: DEFAULT_PUT_VALUE_TIMEOUT,
        }
    }

    /// How long a record published with [Publisher::publish] stays valid.
    pub fn record_lifetime(&mut self, lifetime: Duration) -> &mut Self {
        self.record_lifetime = lifetime;
        self
    }

    /// How signer identities are derived from their keys.
    ///
    /// [IdFormat::Hashed] identities additionally publish their public key and embed it
    /// in every record.
    pub fn identity_format(&mut self, format: IdFormat) -> &mut Self {
        self.identity_format = format;
        self
    }

    /// Bound on the network lookup of the previous record.
    pub fn sequence_lookup_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.sequence_lookup_timeout = timeout;
        self
    }

    /// Bound on each routing write.
    pub fn put_value_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.put_value_timeout = timeout;
        self
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call publish options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// End-of-life of the record. Defaults to now plus the configured record lifetime.
    pub eol: Option<DateTime<Utc>>,
    /// Suggested cache lifetime for resolvers.
    pub ttl: Option<Duration>,
}

impl PublishOptions {
    /// Set the end-of-life.
    pub fn eol(mut self, eol: DateTime<Utc>) -> Self {
        self.eol = Some(eol);
        self
    }

    /// Set the end-of-life to `lifetime` from now.
    pub fn valid_for(self, lifetime: Duration) -> Self {
        self.eol(add_duration(&Utc::now(), lifetime))
    }

    /// Set the cache hint.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishInfo {
    /// The published name.
    pub id: PeerId,
    /// Sequence number of the new record.
    pub sequence: u64,
    /// End-of-life of the new record.
    pub eol: DateTime<Utc>,
    /// The record as stored.
    pub record: Record,
}

/// Publishes name records into a routing substrate.
///
/// Concurrent publishes for the same key are not serialized; both may read the same
/// previous sequence number. Callers needing strict ordering must publish one at a time
/// per key.
#[derive(Debug, Clone)]
pub struct Publisher {
    routing: Arc<dyn ValueStore>,
    datastore: Arc<dyn Datastore>,
    settings: PublisherSettings,
}

impl Publisher {
    /// Publisher with default settings.
    pub fn new(routing: Arc<dyn ValueStore>, datastore: Arc<dyn Datastore>) -> Self {
        Self::new_with_settings(routing, datastore, PublisherSettings::new())
    }

    /// Publisher with custom settings.
    pub fn new_with_settings(
        routing: Arc<dyn ValueStore>,
        datastore: Arc<dyn Datastore>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            routing,
            datastore,
            settings,
        }
    }

    /// The name `keypair` publishes under.
    pub fn identity(&self, keypair: &Keypair) -> PeerId {
        PeerId::from_public_key(&keypair.public_key(), self.settings.identity_format)
    }

    /// Point the name of `keypair` at `value`, valid for the configured record lifetime.
    pub async fn publish(&self, keypair: &Keypair, value: &Path) -> Result<PublishInfo> {
        tracing::debug!("Publish {value}");
        self.publish_with_options(keypair, value, PublishOptions::default())
            .await
    }

    /// Point the name of `keypair` at `value` until `eol`.
    pub async fn publish_with_eol(
        &self,
        keypair: &Keypair,
        value: &Path,
        eol: DateTime<Utc>,
    ) -> Result<PublishInfo> {
        self.publish_with_options(keypair, value, PublishOptions::default().eol(eol))
            .await
    }

    /// Point the name of `keypair` at `value`.
    pub async fn publish_with_options(
        &self,
        keypair: &Keypair,
        value: &Path,
        options: PublishOptions,
    ) -> Result<PublishInfo> {
        let id = self.identity(keypair);
        let (pk_key, ipns_key) = record_keys_for_id(&id);

        let sequence = self.previous_sequence(&ipns_key).await? + 1;
        let eol = options
            .eol
            .unwrap_or_else(|| add_duration(&Utc::now(), self.settings.record_lifetime));

        let mut record = Record::sign(keypair, value, sequence, &eol);
        record.set_ttl(options.ttl);

        // The key cannot be recovered from a hashed identity.
        let publish_key = id.extract_public_key().is_none();
        if publish_key {
            record.embed_public_key(&keypair.public_key());
        }

        let encoded = record.encode();

        let put_record = self.put_value(&ipns_key, encoded.clone(), "put record");
        if publish_key {
            tracing::debug!("Storing public key at: {pk_key}");
            let put_key = self.put_value(
                &pk_key,
                keypair.public_key().as_bytes().to_vec(),
                "put public key",
            );
            // The first failure drops, and so cancels, the other write.
            tokio::try_join!(put_record, put_key)?;
        } else {
            put_record.await?;
        }

        self.datastore.put(&ipns_key, encoded).await?;

        tracing::debug!("Published {id} sequence {sequence} -> {value}");

        Ok(PublishInfo {
            id,
            sequence,
            eol,
            record,
        })
    }

    fn put_value<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        operation: &'static str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        let timeout = self.settings.put_value_timeout;
        async move {
            tracing::debug!("Storing value at: {key}");
            tokio::time::timeout(timeout, self.routing.put_value(key, value))
                .await
                .map_err(|_| Error::Timeout { operation, timeout })??;
            Ok(())
        }
    }

    /// Sequence number of the last record stored under `ipns_key`, 0 if there is none.
    ///
    /// Prefers the local datastore. On a miss, asks the network once; a failed or timed
    /// out lookup counts as "no previous record".
    pub async fn previous_sequence(&self, ipns_key: &str) -> Result<u64> {
        let previous = match self.datastore.get(ipns_key).await? {
            Some(previous) => previous,
            None => {
                let timeout = self.settings.sequence_lookup_timeout;
                let options = GetValueOptions::default();
                let lookup = self.routing.get_value(ipns_key, &options);

                match tokio::time::timeout(timeout, lookup).await {
                    Ok(Ok(previous)) => previous,
                    Ok(Err(error)) => {
                        tracing::debug!("No previous record for {ipns_key}: {error}");
                        return Ok(0);
                    }
                    Err(_) => {
                        tracing::debug!("Previous record lookup for {ipns_key} timed out");
                        return Ok(0);
                    }
                }
            }
        };

        let record = Record::decode(&previous).map_err(ValidationError::from)?;

        Ok(record.sequence())
    }
}
