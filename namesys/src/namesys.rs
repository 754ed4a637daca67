//! The name system: one front door for publishing and resolving names.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use namesys_common::{crypto::Keypair, timestamp::until, KeyBook, Path, PeerId};
use tokio::sync::mpsc;

use crate::{
    cache::ResolverCache,
    config::Config,
    errors::{Error, Result},
    publisher::{PublishInfo, PublishOptions, Publisher, PublisherSettings},
    resolver::{
        DnsResolver, ProquintResolver, ResolveOnce, ResolveOptions, Resolved, ResolverKind,
        RoutingResolver, TxtLookup, NameserverTxtLookup, DEFAULT_DEPTH_LIMIT, DEFAULT_RESOLVER_CACHE_TTL,
    },
    routing::{Datastore, OfflineRouter, ValueStore},
};

/// Default number of names kept by the resolver cache.
pub const DEFAULT_CACHE_SIZE: usize = 128;

const RESULT_BUFFER: usize = 8;

/// Builder of a [NameSystem].
#[derive(Debug, Clone)]
pub struct NameSystemBuilder {
    routing: Arc<dyn ValueStore>,
    datastore: Arc<dyn Datastore>,
    key_book: KeyBook,
    txt_lookup: Option<Arc<dyn TxtLookup>>,
    publisher_settings: PublisherSettings,
    cache_size: usize,
    depth_limit: usize,
    default_cache_ttl: Duration,
    resolve_options: ResolveOptions,
}

impl NameSystemBuilder {
    /// Key book shared by every resolver. Lets callers pre-seed keys of hashed identities.
    pub fn key_book(&mut self, key_book: KeyBook) -> &mut Self {
        self.key_book = key_book;
        self
    }

    /// TXT lookup used for domain names. Defaults to [NameserverTxtLookup::default].
    pub fn txt_lookup(&mut self, lookup: Arc<dyn TxtLookup>) -> &mut Self {
        self.txt_lookup = Some(lookup);
        self
    }

    /// Settings of the internal [Publisher].
    pub fn publisher_settings(&mut self, settings: PublisherSettings) -> &mut Self {
        self.publisher_settings = settings;
        self
    }

    /// Capacity of the resolver cache. 0 disables it.
    pub fn cache_size(&mut self, size: usize) -> &mut Self {
        self.cache_size = size;
        self
    }

    /// Maximum number of `/ipns/` hops of a recursive resolve.
    pub fn depth_limit(&mut self, limit: usize) -> &mut Self {
        self.depth_limit = limit.max(1);
        self
    }

    /// Cache lifetime of records without their own TTL, and upper bound of the cache
    /// lifetime of freshly published names.
    pub fn default_cache_ttl(&mut self, ttl: Duration) -> &mut Self {
        self.default_cache_ttl = ttl;
        self
    }

    /// Options used by [NameSystem::resolve].
    pub fn resolve_options(&mut self, options: ResolveOptions) -> &mut Self {
        self.resolve_options = options;
        self
    }

    /// Apply every setting of `config`.
    pub fn config(&mut self, config: &Config) -> &mut Self {
        self.publisher_settings(config.publisher_settings())
            .cache_size(config.resolver.cache_size)
            .depth_limit(config.resolver.depth_limit)
            .default_cache_ttl(config.default_cache_ttl())
            .resolve_options(config.resolve_options())
            .txt_lookup(Arc::new(config.txt_lookup()))
    }

    /// Build the [NameSystem].
    pub fn build(&self) -> NameSystem {
        let offline = OfflineRouter::with_key_book(self.datastore.clone(), self.key_book.clone());
        let txt_lookup = self
            .txt_lookup
            .clone()
            .unwrap_or_else(|| Arc::new(NameserverTxtLookup::default()));

        NameSystem {
            inner: Arc::new(Inner {
                online: RoutingResolver::new(self.routing.clone(), self.key_book.clone())
                    .with_default_ttl(self.default_cache_ttl),
                offline: RoutingResolver::new(Arc::new(offline), self.key_book.clone())
                    .with_default_ttl(self.default_cache_ttl),
                dns: DnsResolver::new(txt_lookup),
                proquint: ProquintResolver,
                publisher: Publisher::new_with_settings(
                    self.routing.clone(),
                    self.datastore.clone(),
                    self.publisher_settings.clone(),
                ),
                cache: ResolverCache::new(self.cache_size),
                key_book: self.key_book.clone(),
                depth_limit: self.depth_limit,
                default_cache_ttl: self.default_cache_ttl,
                resolve_options: self.resolve_options,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    online: RoutingResolver,
    offline: RoutingResolver,
    dns: DnsResolver,
    proquint: ProquintResolver,
    publisher: Publisher,
    cache: ResolverCache,
    key_book: KeyBook,
    depth_limit: usize,
    default_cache_ttl: Duration,
    resolve_options: ResolveOptions,
}

/// Publishes and resolves names.
///
/// Names are resolved by the strategy matching their key: identities through signed
/// records in the routing substrate, domain names through `dnslink` TXT records, and
/// proquints by decoding them. Results are cached per key for their TTL.
///
/// Cheap to clone, clones share the cache.
#[derive(Debug, Clone)]
pub struct NameSystem {
    inner: Arc<Inner>,
}

enum Entry {
    Resolved(Path),
    Ipns(Path),
}

impl NameSystem {
    /// Builder over a routing substrate and a local datastore.
    pub fn builder(
        routing: Arc<dyn ValueStore>,
        datastore: Arc<dyn Datastore>,
    ) -> NameSystemBuilder {
        NameSystemBuilder {
            routing,
            datastore,
            key_book: KeyBook::default(),
            txt_lookup: None,
            publisher_settings: PublisherSettings::default(),
            cache_size: DEFAULT_CACHE_SIZE,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            default_cache_ttl: DEFAULT_RESOLVER_CACHE_TTL,
            resolve_options: ResolveOptions::default(),
        }
    }

    /// The underlying publisher.
    pub fn publisher(&self) -> &Publisher {
        &self.inner.publisher
    }

    /// The resolver cache.
    pub fn cache(&self) -> &ResolverCache {
        &self.inner.cache
    }

    /// The name `keypair` publishes under.
    pub fn identity(&self, keypair: &Keypair) -> PeerId {
        self.inner.publisher.identity(keypair)
    }

    // === Publish ===

    /// Point the name of `keypair` at `value` for the configured record lifetime.
    pub async fn publish(&self, keypair: &Keypair, value: &Path) -> Result<PublishInfo> {
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

    /// Point the name of `keypair` at `value`, then remember the new target locally.
    pub async fn publish_with_options(
        &self,
        keypair: &Keypair,
        value: &Path,
        options: PublishOptions,
    ) -> Result<PublishInfo> {
        let info = self
            .inner
            .publisher
            .publish_with_options(keypair, value, options)
            .await?;

        // Lets local resolution verify hashed identities without a routing lookup.
        if info.id.extract_public_key().is_none() {
            self.inner.key_book.add(info.id, keypair.public_key());
        }

        let ttl = self
            .inner
            .default_cache_ttl
            .min(until(&info.eol, &Utc::now()));
        self.inner.cache.set(&info.id.to_string(), value.clone(), ttl);

        Ok(info)
    }

    // === Resolve ===

    /// Resolve `name` with the default options.
    pub async fn resolve(&self, name: &str) -> Result<Path> {
        self.resolve_with_options(name, self.inner.resolve_options)
            .await
    }

    /// Resolve `name`.
    ///
    /// `name` may be an `/ipns/` path, an `/ipfs/` path (returned as is) or a bare content
    /// id (returned as `/ipfs/<id>`).
    pub async fn resolve_with_options(&self, name: &str, options: ResolveOptions) -> Result<Path> {
        tracing::debug!("Resolving {name}");

        let mut path = match self.entry(name, &options)? {
            Entry::Resolved(path) => return Ok(path),
            Entry::Ipns(path) => path,
        };

        for _ in 0..self.depth(&options) {
            path = self.resolve_step(&path, &options).await?;
            if !path.is_ipns() || !options.recursive {
                return Ok(path);
            }
        }

        Err(Error::ResolveRecursion(path))
    }

    /// Resolve `name` in the background, streaming results as they improve.
    ///
    /// The last `Ok` received is the best answer. A failure is sent as the final `Err`.
    /// Dropping the receiver cancels the resolution.
    pub fn resolve_async(&self, name: &str, options: ResolveOptions) -> mpsc::Receiver<Result<Path>> {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let this = self.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => tracing::debug!("Resolve of {name} cancelled"),
                result = this.stream_resolve(&name, &options, &tx) => {
                    if let Err(error) = result {
                        let _ = tx.send(Err(error)).await;
                    }
                }
            }
        });

        rx
    }

    fn depth(&self, options: &ResolveOptions) -> usize {
        if options.recursive {
            self.inner.depth_limit
        } else {
            1
        }
    }

    fn entry(&self, name: &str, options: &ResolveOptions) -> Result<Entry> {
        if options.local_only && !options.use_cache {
            return Err(Error::InvalidOptions(
                "cannot resolve locally without the cache",
            ));
        }

        // Bare content ids parse as `/ipfs/` paths.
        let path = Path::parse(name)?;
        if path.is_ipfs() {
            Ok(Entry::Resolved(path))
        } else if path.is_ipns() {
            Ok(Entry::Ipns(path))
        } else {
            Err(Error::InvalidName(name.to_string()))
        }
    }

    fn strategy(&self, key: &str, options: &ResolveOptions) -> Result<&dyn ResolveOnce> {
        Ok(match ResolverKind::classify(key) {
            ResolverKind::Routing if options.local_only => &self.inner.offline,
            ResolverKind::Routing => &self.inner.online,
            ResolverKind::Dns if options.local_only => {
                return Err(Error::InvalidOptions(
                    "domain names cannot be resolved locally",
                ))
            }
            ResolverKind::Dns => &self.inner.dns,
            ResolverKind::Proquint => &self.inner.proquint,
        })
    }

    fn cached(&self, key: &str, options: &ResolveOptions) -> Option<Path> {
        if !options.use_cache {
            return None;
        }
        let path = self.inner.cache.get(key)?;
        tracing::debug!("Cache hit for {key}");
        Some(path)
    }

    fn remember(&self, key: &str, resolved: &Resolved, options: &ResolveOptions) {
        if options.use_cache {
            self.inner
                .cache
                .set(key, resolved.path.clone(), resolved.ttl);
        }
    }

    /// Resolve the key of an `/ipns/` path one level, keeping its residual.
    async fn resolve_step(&self, path: &Path, options: &ResolveOptions) -> Result<Path> {
        let (key, residual) = split(path)?;

        if let Some(cached) = self.cached(key, options) {
            return attach(&cached, &residual);
        }

        let resolved = self
            .strategy(key, options)?
            .resolve_once(key, options)
            .await?;
        self.remember(key, &resolved, options);

        attach(&resolved.path, &residual)
    }

    async fn stream_resolve(
        &self,
        name: &str,
        options: &ResolveOptions,
        out: &mpsc::Sender<Result<Path>>,
    ) -> Result<()> {
        let mut path = match self.entry(name, options)? {
            Entry::Resolved(path) => {
                let _ = out.send(Ok(path)).await;
                return Ok(());
            }
            Entry::Ipns(path) => path,
        };

        for _ in 0..self.depth(options) {
            let (key, residual) = split(&path)?;

            let next = match self.cached(key, options) {
                Some(cached) => {
                    let next = attach(&cached, &residual)?;
                    if !next.is_ipns() || !options.recursive {
                        let _ = out.send(Ok(next)).await;
                        return Ok(());
                    }
                    next
                }
                None => {
                    let best = self.stream_step(key, &residual, options, out).await?;
                    self.remember(key, &best, options);

                    let next = attach(&best.path, &residual)?;
                    if !next.is_ipns() || !options.recursive {
                        // Already streamed.
                        return Ok(());
                    }
                    next
                }
            };

            path = next;
        }

        Err(Error::ResolveRecursion(path))
    }

    /// Run the streaming strategy for `key`, forwarding final answers to `out`, and
    /// return the best one.
    async fn stream_step(
        &self,
        key: &str,
        residual: &str,
        options: &ResolveOptions,
        out: &mpsc::Sender<Result<Path>>,
    ) -> Result<Resolved> {
        let strategy = self.strategy(key, options)?;
        let (tx, mut rx) = mpsc::channel(RESULT_BUFFER);

        let produce = async move {
            strategy.resolve_once_streaming(key, options, &tx).await;
        };

        let consume = async {
            let mut best = None;
            let mut last_error = None;

            while let Some(result) = rx.recv().await {
                match result {
                    Ok(resolved) => {
                        let next = match attach(&resolved.path, residual) {
                            Ok(next) => next,
                            Err(error) => {
                                last_error = Some(error);
                                continue;
                            }
                        };
                        if (!next.is_ipns() || !options.recursive)
                            && out.send(Ok(next)).await.is_err()
                        {
                            break;
                        }
                        best = Some(resolved);
                    }
                    Err(error) => last_error = Some(error),
                }
            }

            match (best, last_error) {
                (Some(best), _) => Ok(best),
                (None, Some(error)) => Err(error),
                (None, None) => Err(Error::ResolveFailed(key.to_string())),
            }
        };

        let ((), best) = tokio::join!(produce, consume);
        best
    }
}

/// Split `/ipns/<key>/<residual>`.
fn split(path: &Path) -> Result<(&str, String)> {
    match path.segments().as_slice() {
        ["ipns", key, residual @ ..] if !key.is_empty() => Ok((*key, residual.join("/"))),
        _ => Err(Error::InvalidName(path.to_string())),
    }
}

fn attach(path: &Path, residual: &str) -> Result<Path> {
    if residual.trim_matches('/').is_empty() {
        return Ok(path.clone());
    }
    Ok(path.join(residual)?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use namesys_common::{IdFormat, Multihash, ValidationError};

    use super::*;
    use crate::errors::{DnsError, RoutingError};
    use crate::resolver::{proquint, TxtRecord};
    use crate::routing::{GetValueOptions, MemoryDatastore};

    /// Offline routing that counts lookups.
    #[derive(Debug)]
    struct CountingRouter {
        router: OfflineRouter,
        gets: AtomicUsize,
    }

    impl CountingRouter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                router: OfflineRouter::new(Arc::new(MemoryDatastore::default())),
                gets: AtomicUsize::new(0),
            })
        }

        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ValueStore for CountingRouter {
        async fn put_value(&self, key: &str, value: Vec<u8>) -> std::result::Result<(), RoutingError> {
            self.router.put_value(key, value).await
        }

        async fn get_value(
            &self,
            key: &str,
            options: &GetValueOptions,
        ) -> std::result::Result<Vec<u8>, RoutingError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.router.get_value(key, options).await
        }
    }

    #[derive(Debug)]
    struct StaticTxt(String);

    #[async_trait]
    impl TxtLookup for StaticTxt {
        async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<TxtRecord>, DnsError> {
            if name.starts_with("_dnslink.") {
                return Err(DnsError::NoRecords(name.to_string()));
            }
            Ok(vec![TxtRecord {
                text: format!("dnslink={}", self.0),
                ttl: Duration::from_secs(120),
            }])
        }
    }

    fn content(data: &[u8]) -> Path {
        Path::from_content(&Multihash::blake3(data))
    }

    fn ipns(id: &PeerId) -> Path {
        Path::parse(&format!("/ipns/{id}")).unwrap()
    }

    fn name_system(router: Arc<CountingRouter>) -> NameSystem {
        NameSystem::builder(router, Arc::new(MemoryDatastore::default()))
            .txt_lookup(Arc::new(StaticTxt(content(b"dns").to_string())))
            .build()
    }

    #[tokio::test]
    async fn front_door() {
        let ns = name_system(CountingRouter::new());
        let hash = Multihash::blake3(b"front");

        assert_eq!(
            ns.resolve(&format!("/ipfs/{hash}/a")).await.unwrap().as_str(),
            format!("/ipfs/{hash}/a")
        );
        assert_eq!(
            ns.resolve(&hash.to_string()).await.unwrap(),
            Path::from_content(&hash)
        );
        assert!(matches!(
            ns.resolve("/other/thing").await,
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(ns.resolve("/ipns/").await, Err(Error::InvalidName(_))));
        assert!(matches!(ns.resolve("not a hash").await, Err(Error::InvalidName(_))));
    }

    #[tokio::test]
    async fn publish_then_resolve() {
        let router = CountingRouter::new();
        let ns = name_system(router.clone());
        let keypair = Keypair::random();

        let info = ns.publish(&keypair, &content(b"v1")).await.unwrap();
        assert_eq!(info.sequence, 1);
        assert_eq!(info.id, ns.identity(&keypair));
        let gets = router.gets();

        // Served by the cache filled on publish.
        let name = ipns(&info.id).to_string();
        assert_eq!(ns.resolve(&name).await.unwrap(), content(b"v1"));
        assert_eq!(router.gets(), gets);

        let fresh = ns
            .resolve_with_options(&name, ResolveOptions::default().no_cache())
            .await
            .unwrap();
        assert_eq!(fresh, content(b"v1"));
        assert_eq!(router.gets(), gets + 1);
    }

    #[tokio::test]
    async fn residual_is_kept() {
        let ns = name_system(CountingRouter::new());
        let keypair = Keypair::random();
        let info = ns.publish(&keypair, &content(b"dir")).await.unwrap();

        for options in [ResolveOptions::default(), ResolveOptions::default().no_cache()] {
            let resolved = ns
                .resolve_with_options(&format!("{}/a/b.txt", ipns(&info.id)), options)
                .await
                .unwrap();
            assert_eq!(resolved, content(b"dir").join("a/b.txt").unwrap());
        }
    }

    #[tokio::test]
    async fn recursion() {
        let ns = name_system(CountingRouter::new());
        let end = Keypair::random();
        let middle = Keypair::random();

        let end_info = ns.publish(&end, &content(b"end")).await.unwrap();
        let middle_info = ns.publish(&middle, &ipns(&end_info.id)).await.unwrap();
        let name = ipns(&middle_info.id).to_string();

        for options in [ResolveOptions::default(), ResolveOptions::default().no_cache()] {
            assert_eq!(
                ns.resolve_with_options(&name, options).await.unwrap(),
                content(b"end")
            );
            assert_eq!(
                ns.resolve_with_options(&name, options.non_recursive())
                    .await
                    .unwrap(),
                ipns(&end_info.id)
            );
        }
    }

    #[tokio::test]
    async fn recursion_is_bounded() {
        let ns = name_system(CountingRouter::new());
        let keypair = Keypair::random();
        let id = ns.identity(&keypair);
        ns.publish(&keypair, &ipns(&id)).await.unwrap();

        let error = ns.resolve(&ipns(&id).to_string()).await.unwrap_err();
        assert!(matches!(error, Error::ResolveRecursion(path) if path == ipns(&id)));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let router = CountingRouter::new();
        let ns = name_system(router.clone());
        let keypair = Keypair::random();
        let id = ns.identity(&keypair);
        let (_, ipns_key) = namesys_common::record_keys_for_id(&id);

        // An expired record written behind the name system's back.
        let expired = namesys_common::Record::sign(
            &keypair,
            &content(b"old"),
            1,
            &(Utc::now() - TimeDelta::hours(1)),
        );
        let datastore = MemoryDatastore::default();
        datastore.put(&ipns_key, expired.encode()).await.unwrap();
        let stale = NameSystem::builder(
            Arc::new(OfflineRouter::new(Arc::new(datastore.clone()))),
            Arc::new(datastore),
        )
        .build();

        for _ in 0..2 {
            let error = stale.resolve(&ipns(&id).to_string()).await.unwrap_err();
            assert!(matches!(
                error,
                Error::Validation(ValidationError::ExpiredRecord)
            ));
        }
        assert!(stale.cache().is_empty());

        let error = ns.resolve(&ipns(&id).to_string()).await.unwrap_err();
        assert!(matches!(error, Error::Routing(RoutingError::NotFound(_))));
        assert!(ns.cache().is_empty());
    }

    #[tokio::test]
    async fn local_only() {
        let router = CountingRouter::new();
        let datastore = Arc::new(MemoryDatastore::default());
        let ns = NameSystem::builder(router.clone(), datastore)
            .cache_size(0)
            .build();
        let keypair = Keypair::random();
        let info = ns.publish(&keypair, &content(b"local")).await.unwrap();
        let name = ipns(&info.id).to_string();
        let gets = router.gets();

        let resolved = ns
            .resolve_with_options(&name, ResolveOptions::default().local_only())
            .await
            .unwrap();
        assert_eq!(resolved, content(b"local"));
        assert_eq!(router.gets(), gets);

        assert!(matches!(
            ns.resolve_with_options(&name, ResolveOptions::default().local_only().no_cache())
                .await,
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            ns.resolve_with_options("/ipns/example.com", ResolveOptions::default().local_only())
                .await,
            Err(Error::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn dns_and_proquint_keys() {
        let router = CountingRouter::new();
        let ns = name_system(router.clone());

        assert_eq!(ns.resolve("/ipns/example.com").await.unwrap(), content(b"dns"));
        assert_eq!(ns.cache().get("example.com"), Some(content(b"dns")));

        let target = content(b"quint");
        let key = proquint::encode(target.as_bytes());
        assert_eq!(ns.resolve(&format!("/ipns/{key}")).await.unwrap(), target);
        assert_eq!(ns.cache().get(&key), None);

        assert_eq!(router.gets(), 0);
    }

    #[tokio::test]
    async fn hashed_identities() {
        let router = CountingRouter::new();
        let mut settings = PublisherSettings::new();
        settings.identity_format(IdFormat::Hashed);
        let ns = NameSystem::builder(router.clone(), Arc::new(MemoryDatastore::default()))
            .publisher_settings(settings)
            .build();

        let keypair = Keypair::random();
        let info = ns.publish(&keypair, &content(b"hashed")).await.unwrap();
        assert_eq!(info.id.format(), IdFormat::Hashed);

        for options in [
            ResolveOptions::default().no_cache(),
            ResolveOptions::default().local_only(),
        ] {
            let resolved = ns
                .resolve_with_options(&ipns(&info.id).to_string(), options)
                .await
                .unwrap();
            assert_eq!(resolved, content(b"hashed"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_cache_ttl_is_bounded_by_eol() {
        let ns = NameSystem::builder(CountingRouter::new(), Arc::new(MemoryDatastore::default()))
            .default_cache_ttl(Duration::from_secs(3600))
            .build();

        // The record expires before the default TTL runs out.
        let brief = ns
            .publish_with_eol(
                &Keypair::random(),
                &content(b"brief"),
                Utc::now() + TimeDelta::minutes(10),
            )
            .await
            .unwrap();
        // The default TTL runs out before the record expires.
        let long = ns
            .publish_with_eol(
                &Keypair::random(),
                &content(b"long"),
                Utc::now() + TimeDelta::hours(2),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9 * 60)).await;
        assert_eq!(ns.cache().get(&brief.id.to_string()), Some(content(b"brief")));
        assert_eq!(ns.cache().get(&long.id.to_string()), Some(content(b"long")));

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(ns.cache().get(&brief.id.to_string()), None);
        assert_eq!(ns.cache().get(&long.id.to_string()), Some(content(b"long")));

        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        assert_eq!(ns.cache().get(&long.id.to_string()), None);
    }

    #[tokio::test]
    async fn resolve_async_streams_final_answer() {
        let ns = name_system(CountingRouter::new());
        let end = Keypair::random();
        let middle = Keypair::random();
        let end_info = ns.publish(&end, &content(b"async")).await.unwrap();
        let middle_info = ns.publish(&middle, &ipns(&end_info.id)).await.unwrap();

        for options in [ResolveOptions::default(), ResolveOptions::default().no_cache()] {
            let mut rx = ns.resolve_async(&ipns(&middle_info.id).to_string(), options);
            let mut results = Vec::new();
            while let Some(result) = rx.recv().await {
                results.push(result.unwrap());
            }
            assert_eq!(results.last(), Some(&content(b"async")));
        }

        let mut rx = ns.resolve_async("/ipns/nope-nope", ResolveOptions::default());
        assert!(matches!(rx.recv().await, Some(Err(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn resolve_async_cancels_on_drop() {
        #[derive(Debug)]
        struct Hanging;

        #[async_trait]
        impl TxtLookup for Hanging {
            async fn lookup_txt(&self, _name: &str) -> std::result::Result<Vec<TxtRecord>, DnsError> {
                std::future::pending().await
            }
        }

        let lookup = Arc::new(Hanging);
        let ns = NameSystem::builder(CountingRouter::new(), Arc::new(MemoryDatastore::default()))
            .txt_lookup(lookup.clone())
            .build();

        let rx = ns.resolve_async("/ipns/example.com", ResolveOptions::default());
        tokio::task::yield_now().await;
        drop(rx);

        // The background task lets go of the name system once it notices.
        for _ in 0..100 {
            if Arc::strong_count(&ns.inner) == 1 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("resolve task still running");
    }
}
