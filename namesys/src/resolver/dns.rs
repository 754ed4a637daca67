//! `dnslink` resolution over DNS TXT records.

use std::fmt::{self, Debug};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::Resolver;
use namesys_common::Path;

use super::{ResolveOnce, ResolveOptions, Resolved};
use crate::errors::{DnsError, Result};

/// Default bound on a single DNS query.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

const DNSLINK_PREFIX: &str = "dnslink=";

/// A TXT record as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    /// All character strings of the record, concatenated.
    pub text: String,
    /// TTL the server answered with.
    pub ttl: Duration,
}

/// Looks up TXT records.
#[async_trait]
pub trait TxtLookup: Debug + Send + Sync {
    /// TXT records of `name`.
    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<TxtRecord>, DnsError>;
}

/// [TxtLookup] asking a single nameserver, over UDP with a TCP retry for truncated answers.
#[derive(Clone)]
pub struct NameserverTxtLookup {
    nameserver: SocketAddr,
    timeout: Duration,
    resolver: Arc<Resolver<TokioConnectionProvider>>,
}

impl NameserverTxtLookup {
    /// Lookup against `nameserver`, giving up after `timeout`.
    pub fn new(nameserver: SocketAddr, timeout: Duration) -> Self {
        let name_servers = vec![
            NameServerConfig::new(nameserver, Protocol::Udp),
            NameServerConfig::new(nameserver, Protocol::Tcp),
        ];
        let config = ResolverConfig::from_parts(None, vec![], name_servers);

        let mut options = ResolverOpts::default();
        options.timeout = timeout;
        options.attempts = 1;
        options.edns0 = true;
        // Answers are cached by the name system, with their TTL.
        options.cache_size = 0;

        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(options)
            .build();

        Self {
            nameserver,
            timeout,
            resolver: Arc::new(resolver),
        }
    }

    async fn query(&self, name: &str) -> std::result::Result<Vec<TxtRecord>, DnsError> {
        let lookup = self.resolver.txt_lookup(name).await.map_err(|error| {
            if error.is_no_records_found() {
                DnsError::NoRecords(name.to_string())
            } else {
                DnsError::Lookup(error)
            }
        })?;

        let ttl = lookup
            .as_lookup()
            .record_iter()
            .map(|record| record.ttl())
            .min()
            .map(|ttl| Duration::from_secs(ttl.into()))
            .unwrap_or_default();

        let mut records = Vec::new();
        for txt in lookup.iter() {
            let bytes: Vec<u8> = txt.txt_data().iter().flat_map(|s| s.iter().copied()).collect();
            match String::from_utf8(bytes) {
                Ok(text) => records.push(TxtRecord { text, ttl }),
                Err(error) => tracing::debug!("Ignoring non UTF-8 TXT record of {name}: {error}"),
            }
        }

        Ok(records)
    }
}

impl Debug for NameserverTxtLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameserverTxtLookup")
            .field("nameserver", &self.nameserver)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for NameserverTxtLookup {
    fn default() -> Self {
        Self::new(SocketAddr::from(([1, 1, 1, 1], 53)), DEFAULT_DNS_TIMEOUT)
    }
}

#[async_trait]
impl TxtLookup for NameserverTxtLookup {
    async fn lookup_txt(&self, name: &str) -> std::result::Result<Vec<TxtRecord>, DnsError> {
        tokio::time::timeout(self.timeout, self.query(name))
            .await
            .map_err(|_| DnsError::Timeout)?
    }
}

/// Resolves domain names through their `dnslink` TXT records.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    lookup: Arc<dyn TxtLookup>,
}

impl DnsResolver {
    /// Resolver using `lookup` for TXT queries.
    pub fn new(lookup: Arc<dyn TxtLookup>) -> Self {
        Self { lookup }
    }

    async fn lookup_link(&self, name: &str) -> std::result::Result<Resolved, DnsError> {
        let records = self.lookup.lookup_txt(name).await?;
        if records.is_empty() {
            return Err(DnsError::NoRecords(name.to_string()));
        }

        records
            .into_iter()
            .find_map(|record| {
                parse_entry(&record.text).map(|path| Resolved {
                    path,
                    ttl: record.ttl,
                })
            })
            .ok_or_else(|| DnsError::NoLink(name.to_string()))
    }
}

#[async_trait]
impl ResolveOnce for DnsResolver {
    async fn resolve_once(&self, domain: &str, _options: &ResolveOptions) -> Result<Resolved> {
        tracing::debug!("DnsResolver resolving {domain}");

        let subdomain = format!("_dnslink.{domain}");
        let (sub, root) = tokio::join!(self.lookup_link(&subdomain), self.lookup_link(domain));

        match sub {
            Ok(resolved) => Ok(resolved),
            Err(error) => {
                tracing::debug!("No link at {subdomain}: {error}");
                Ok(root?)
            }
        }
    }
}

/// Path of a single TXT entry: either `dnslink=<path>` or a bare path or content id.
pub fn parse_entry(text: &str) -> Option<Path> {
    let text = text.trim();
    let link = text.strip_prefix(DNSLINK_PREFIX).unwrap_or(text);
    Path::parse(link.trim()).ok()
}

/// Whether `key` looks like a fully qualified domain name.
pub fn is_domain(key: &str) -> bool {
    let name = key.strip_suffix('.').unwrap_or(key);
    let Some((_, tld)) = name.rsplit_once('.') else {
        return false;
    };

    !tld.is_empty()
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && hostname_validator::is_valid(name)
}
