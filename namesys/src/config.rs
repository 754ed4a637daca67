//! TOML configuration.
//!
//! Every key has a default in the embedded `config.default.toml`; a user file is
//! deep-merged on top of it, so it only needs the keys it changes.

use std::{fs, net::SocketAddr, path::Path, str::FromStr, time::Duration};

use namesys_common::IdFormat;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::{
    log_level::{LogLevel, TargetLevel},
    providers::ProvideSettings,
    publisher::PublisherSettings,
    resolver::{ResolveOptions, NameserverTxtLookup},
};

/// The embedded defaults.
pub const DEFAULT_CONFIG: &str = include_str!("config.default.toml");

/// Errors reading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The file or the merged result is not a valid config.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
    /// The user file could not be merged over the defaults.
    #[error("failed to merge embedded and user TOML: {0}")]
    ConfigMergeError(String),
}

/// `[resolver]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResolverToml {
    /// Resolved names kept in memory, 0 disables the cache.
    pub cache_size: usize,
    /// Cache lifetime of records without a TTL, in seconds.
    pub default_cache_ttl_s: u64,
    /// Maximum `/ipns/` hops of a recursive resolve.
    pub depth_limit: usize,
    /// Routing quorum.
    pub dht_record_count: usize,
    /// Routing lookup bound, in milliseconds.
    pub dht_timeout_ms: u64,
}

/// How identities are derived from keys, as written in TOML.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityFormatToml {
    /// The id carries the public key.
    Inline,
    /// The id is a hash of the public key.
    Hashed,
}

impl From<IdentityFormatToml> for IdFormat {
    fn from(value: IdentityFormatToml) -> Self {
        match value {
            IdentityFormatToml::Inline => IdFormat::Inline,
            IdentityFormatToml::Hashed => IdFormat::Hashed,
        }
    }
}

/// `[publisher]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PublisherToml {
    /// Default record validity, in seconds.
    pub record_lifetime_s: u64,
    /// Identity derivation.
    pub identity_format: IdentityFormatToml,
    /// Bound on the previous sequence lookup, in milliseconds.
    pub sequence_lookup_timeout_ms: u64,
    /// Bound on each routing write, in milliseconds.
    pub put_value_timeout_ms: u64,
}

/// `[dns]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DnsToml {
    /// Nameserver queried for TXT records.
    pub nameserver: SocketAddr,
    /// Query bound, in milliseconds.
    pub timeout_ms: u64,
}

/// `[providers]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProvidersToml {
    /// Concurrent provide calls.
    pub worker_max: usize,
    /// Bound on each provide call, in milliseconds.
    pub provide_timeout_ms: u64,
}

/// `[logging]`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LoggingToml {
    /// Level of every target without its own directive.
    #[serde(default)]
    pub level: LogLevel,
    /// Per target overrides.
    #[serde(default)]
    pub module_levels: Vec<TargetLevel>,
}

impl LoggingToml {
    /// Filter built from the configured levels.
    pub fn env_filter(&self) -> EnvFilter {
        self.module_levels.iter().fold(
            EnvFilter::new("").add_directive(self.level.clone().into()),
            |filter, target| filter.add_directive(target.clone().into()),
        )
    }
}

/// The complete namesys configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// `[resolver]`
    pub resolver: ResolverToml,
    /// `[publisher]`
    pub publisher: PublisherToml,
    /// `[dns]`
    pub dns: DnsToml,
    /// `[providers]`
    pub providers: ProvidersToml,
    /// `[logging]`, tracing is left alone when absent.
    pub logging: Option<LoggingToml>,
}

impl Default for Config {
    fn default() -> Self {
        Config::from_str(DEFAULT_CONFIG).expect("Embedded config.default.toml must be valid")
    }
}

impl Config {
    /// Read `path` and merge it over the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_str_with_defaults(&raw)
    }

    /// Merge `raw` over the defaults.
    pub fn from_str_with_defaults(raw: &str) -> Result<Self, ConfigReadError> {
        let default_val: toml::Value = DEFAULT_CONFIG
            .parse()
            .expect("embedded defaults invalid TOML");

        let user_val: toml::Value = raw.parse()?;

        let merged_val = serde_toml_merge::merge(default_val, user_val)
            .map_err(|e| ConfigReadError::ConfigMergeError(e.to_string()))?;

        Ok(merged_val.try_into()?)
    }

    /// Publisher settings of this config.
    pub fn publisher_settings(&self) -> PublisherSettings {
        let publisher = &self.publisher;
        let mut settings = PublisherSettings::new();
        settings
            .record_lifetime(Duration::from_secs(publisher.record_lifetime_s))
            .identity_format(publisher.identity_format.into())
            .sequence_lookup_timeout(Duration::from_millis(publisher.sequence_lookup_timeout_ms))
            .put_value_timeout(Duration::from_millis(publisher.put_value_timeout_ms));
        settings
    }

    /// Default options of resolve calls.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .quorum(self.resolver.dht_record_count)
            .timeout(Some(Duration::from_millis(self.resolver.dht_timeout_ms)))
    }

    /// Cache lifetime of records without a TTL.
    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.resolver.default_cache_ttl_s)
    }

    /// TXT lookup against the configured nameserver.
    pub fn txt_lookup(&self) -> NameserverTxtLookup {
        NameserverTxtLookup::new(
            self.dns.nameserver,
            Duration::from_millis(self.dns.timeout_ms),
        )
    }

    /// Provider queue settings.
    pub fn provide_settings(&self) -> ProvideSettings {
        let mut settings = ProvideSettings::new();
        settings
            .worker_max(self.providers.worker_max)
            .provide_timeout(Duration::from_millis(self.providers.provide_timeout_ms));
        settings
    }

    /// Config for tests: short timeouts and a local nameserver.
    pub fn test() -> Self {
        let mut config = Self::default();
        config.resolver.dht_timeout_ms = 5_000;
        config.publisher.sequence_lookup_timeout_ms = 1_000;
        config.publisher.put_value_timeout_ms = 5_000;
        config.dns.nameserver = SocketAddr::from(([127, 0, 0, 1], 9));
        config.dns.timeout_ms = 200;
        config
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
