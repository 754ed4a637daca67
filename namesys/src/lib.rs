#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

mod cache;
mod config;
pub mod errors;
mod keystore;
mod log_level;
mod namesys;
mod providers;
mod publisher;
pub mod resolver;
pub mod routing;
mod tracing;

// --- PUBLIC API EXPORTS ---
// Front door
pub use namesys::{NameSystem, NameSystemBuilder, DEFAULT_CACHE_SIZE};
// Publishing
pub use publisher::{
    PublishInfo, PublishOptions, Publisher, PublisherSettings, DEFAULT_PUT_VALUE_TIMEOUT,
    DEFAULT_RECORD_LIFETIME, DEFAULT_SEQUENCE_LOOKUP_TIMEOUT,
};
// Resolving
pub use cache::ResolverCache;
pub use resolver::{
    DnsResolver, ProquintResolver, ResolveOnce, ResolveOptions, Resolved, ResolverKind,
    RoutingResolver, TxtLookup, TxtRecord, NameserverTxtLookup,
};
// Substrates
pub use routing::{
    get_public_key, ContentRouting, Datastore, FsDatastore, GetValueOptions, MemoryDatastore,
    OfflineRouter, ValueStore,
};
pub use providers::{ProvideQueue, ProvideSettings};
// Keys
pub use keystore::{lookup_key, validate_name, FsKeystore, Keystore, MemoryKeystore};

// Configuration and logging
pub use config::{
    Config, ConfigReadError, DnsToml, IdentityFormatToml, LoggingToml, ProvidersToml,
    PublisherToml, ResolverToml, DEFAULT_CONFIG,
};
pub use log_level::{LogLevel, TargetLevel};
pub use crate::tracing::init_tracing_logs_with_config_if_set;

// Errors
pub use errors::{DatastoreError, DnsError, Error, KeystoreError, Result, RoutingError};

// Re-exports
pub use namesys_common::{
    crypto::{Keypair, PublicKey},
    IdFormat, IpnsValidator, KeyBook, Multihash, Path, PeerId, Record, ValidationError,
};
