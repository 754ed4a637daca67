//! Resolution strategies and the options shared by all of them.
//!
//! A key is resolved by exactly one strategy, picked by [ResolverKind::classify]:
//! identities go to the routing substrate, domain names to DNS, and anything else is
//! decoded as a proquint.

mod dns;
pub mod proquint;
mod routing;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use namesys_common::{Path, PeerId};
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::routing::DEFAULT_QUORUM;

pub use dns::{is_domain, parse_entry, DnsResolver, TxtLookup, TxtRecord, NameserverTxtLookup};
pub use proquint::ProquintResolver;
pub use routing::RoutingResolver;

/// Maximum number of `/ipns/` hops followed by a recursive resolution.
pub const DEFAULT_DEPTH_LIMIT: usize = 32;

/// Cache lifetime of resolved records that do not carry their own TTL.
pub const DEFAULT_RESOLVER_CACHE_TTL: Duration = Duration::from_secs(60);

/// Bound on a single routing lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Options of a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Keep resolving while the result is itself an `/ipns/` path.
    pub recursive: bool,
    /// Never touch the network, only the local datastore.
    pub local_only: bool,
    /// Read from and write to the resolver cache.
    pub use_cache: bool,
    /// Number of routing replicas to hear from.
    pub quorum: usize,
    /// Bound on each routing lookup. `None` waits as long as the substrate does.
    pub timeout: Option<Duration>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            local_only: false,
            use_cache: true,
            quorum: DEFAULT_QUORUM,
            timeout: Some(DEFAULT_RESOLVE_TIMEOUT),
        }
    }
}

impl ResolveOptions {
    /// Resolve a single step only.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Only consult the local datastore.
    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    /// Bypass the resolver cache.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Set the routing quorum.
    pub fn quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    /// Set the routing lookup bound.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One resolution step: where a key points and for how long that may be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The target.
    pub path: Path,
    /// How long the answer may be cached. Zero means "do not cache".
    pub ttl: Duration,
}

/// The strategies a key can be resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// Signed records in the routing substrate.
    Routing,
    /// `dnslink` TXT records.
    Dns,
    /// The key itself, proquint-encoded.
    Proquint,
}

impl ResolverKind {
    /// Pick the strategy for `key`.
    pub fn classify(key: &str) -> Self {
        if key.parse::<PeerId>().is_ok() {
            ResolverKind::Routing
        } else if is_domain(key) {
            ResolverKind::Dns
        } else {
            ResolverKind::Proquint
        }
    }
}

/// A strategy resolving one key, one step, with no recursion.
#[async_trait]
pub trait ResolveOnce: Debug + Send + Sync {
    /// Resolve `key`.
    async fn resolve_once(&self, key: &str, options: &ResolveOptions) -> Result<Resolved>;

    /// Stream answers for `key` to `out` as they improve. The last `Ok` sent is the best.
    ///
    /// Returns once nothing more will be sent or `out` is closed. The default sends the
    /// single [ResolveOnce::resolve_once] answer.
    async fn resolve_once_streaming(
        &self,
        key: &str,
        options: &ResolveOptions,
        out: &mpsc::Sender<Result<Resolved>>,
    ) {
        let result = self.resolve_once(key, options).await;
        let _ = out.send(result).await;
    }
}

#[cfg(test)]
mod tests {
    use namesys_common::{crypto::Keypair, IdFormat};

    use super::*;

    #[test]
    fn classification() {
        let keypair = Keypair::random();
        for format in [IdFormat::Inline, IdFormat::Hashed] {
            let id = PeerId::from_public_key(&keypair.public_key(), format);
            assert_eq!(
                ResolverKind::classify(&id.to_string()),
                ResolverKind::Routing
            );
        }

        assert_eq!(ResolverKind::classify("example.com"), ResolverKind::Dns);
        assert_eq!(ResolverKind::classify("docs.example.org"), ResolverKind::Dns);

        assert_eq!(ResolverKind::classify("lusab-babad"), ResolverKind::Proquint);
        assert_eq!(ResolverKind::classify("localhost"), ResolverKind::Proquint);
    }

    #[test]
    fn default_options() {
        let options = ResolveOptions::default();
        assert!(options.recursive);
        assert!(options.use_cache);
        assert!(!options.local_only);
        assert_eq!(options.quorum, DEFAULT_QUORUM);

        let options = options.non_recursive().no_cache().quorum(1);
        assert!(!options.recursive);
        assert!(!options.use_cache);
        assert_eq!(options.quorum, 1);
    }
}
