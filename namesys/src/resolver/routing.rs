use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use namesys_common::{
    record_keys_for_id, timestamp::until, IpnsValidator, KeyBook, Path, PeerId, Record,
    ValidationError, Validator,
};
use tokio::sync::mpsc;

use super::{ResolveOnce, ResolveOptions, Resolved, DEFAULT_RESOLVER_CACHE_TTL};
use crate::errors::{Error, Result, RoutingError};
use crate::routing::{get_public_key, GetValueOptions, ValueStore};

/// Resolves identities through signed records in a [ValueStore].
#[derive(Debug, Clone)]
pub struct RoutingResolver {
    routing: Arc<dyn ValueStore>,
    validator: IpnsValidator,
    default_ttl: Duration,
}

impl RoutingResolver {
    /// Resolver over `routing`, checking signatures of hashed identities with `key_book`.
    pub fn new(routing: Arc<dyn ValueStore>, key_book: KeyBook) -> Self {
        Self {
            routing,
            validator: IpnsValidator::new(key_book),
            default_ttl: DEFAULT_RESOLVER_CACHE_TTL,
        }
    }

    /// Cache lifetime of records without a TTL of their own.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn key_book(&self) -> &KeyBook {
        self.validator.key_book()
    }

    /// Check `value` and turn it into a resolution.
    fn resolved(&self, ipns_key: &str, value: &[u8]) -> Result<Resolved> {
        self.validator.validate(ipns_key, value)?;

        let record = Record::decode(value).map_err(ValidationError::from)?;
        let path = Path::from_record_value(record.value())
            .map_err(|error| Error::ResolveFailed(format!("{ipns_key}: {error}")))?;

        let ttl = record.ttl_duration().unwrap_or(self.default_ttl);
        let ttl = ttl.min(until(&record.eol()?, &Utc::now()));

        Ok(Resolved { path, ttl })
    }

    /// Parse `key` and make sure its public key is known.
    async fn prepare(&self, key: &str) -> Result<String> {
        let id: PeerId = key.parse().map_err(|_| ValidationError::KeyFormat)?;
        get_public_key(&*self.routing, self.key_book(), &id, None).await?;

        let (_, ipns_key) = record_keys_for_id(&id);
        Ok(ipns_key)
    }
}

fn routing_error(error: RoutingError) -> Error {
    match error {
        RoutingError::Rejected(reason) => Error::Validation(reason),
        error => Error::Routing(error),
    }
}

async fn bounded<T>(
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| Error::Timeout {
                operation: "routing lookup",
                timeout,
            })?,
        None => future.await,
    }
}

#[async_trait]
impl ResolveOnce for RoutingResolver {
    async fn resolve_once(&self, key: &str, options: &ResolveOptions) -> Result<Resolved> {
        tracing::debug!("RoutingResolver resolving {key}");

        bounded(options.timeout, async {
            let ipns_key = self.prepare(key).await?;

            let value = self
                .routing
                .get_value(&ipns_key, &GetValueOptions::with_quorum(options.quorum))
                .await
                .map_err(routing_error)?;

            self.resolved(&ipns_key, &value)
        })
        .await
        .inspect_err(|error| tracing::debug!("RoutingResolver failed to resolve {key}: {error}"))
    }

    async fn resolve_once_streaming(
        &self,
        key: &str,
        options: &ResolveOptions,
        out: &mpsc::Sender<Result<Resolved>>,
    ) {
        let stream = async {
            let ipns_key = self.prepare(key).await?;

            let mut values = self
                .routing
                .search_value(&ipns_key, &GetValueOptions::with_quorum(options.quorum))
                .await
                .map_err(routing_error)?;

            let mut last_error = None;
            let mut sent = false;
            while let Some(value) = values.recv().await {
                match self.resolved(&ipns_key, &value) {
                    Ok(resolved) => {
                        if out.send(Ok(resolved)).await.is_err() {
                            return Ok(());
                        }
                        sent = true;
                    }
                    Err(error) => {
                        tracing::debug!("Skipping value for {ipns_key}: {error}");
                        last_error = Some(error);
                    }
                }
            }

            match (sent, last_error) {
                (true, _) => Ok(()),
                (false, Some(error)) => Err(error),
                (false, None) => Err(RoutingError::NotFound(ipns_key).into()),
            }
        };

        if let Err(error) = bounded(options.timeout, stream).await {
            let _ = out.send(Err(error)).await;
        }
    }
}
