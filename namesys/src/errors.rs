//! Unified error types for the `namesys` crate.
//!
//! Every publish and resolve failure ends up in the top-level [`Error`] enum, keeping the
//! most specific cause reached (an expired record is not reported as "not found").

use std::time::Duration;

use namesys_common::{Path, ValidationError};
use thiserror::Error;

/// Convenient alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate's top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A record or public key failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The routing substrate failed or had nothing for the key.
    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// A bounded network operation did not complete in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// The name could not be parsed into something resolvable.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// A strategy ran but produced nothing usable.
    #[error("Could not resolve name: {0}")]
    ResolveFailed(String),

    /// Recursive resolution hit the depth limit. Carries the last path reached.
    #[error("Could not resolve name (recursion limit exceeded), last path: {0}")]
    ResolveRecursion(Path),

    /// DNS lookup failed.
    #[error("DNS lookup failed: {0}")]
    Dns(#[from] DnsError),

    /// Key storage failed.
    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    /// The local datastore failed.
    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    /// Conflicting or unsupported resolve options.
    #[error("Invalid options: {0}")]
    InvalidOptions(&'static str),
}

impl Error {
    /// Returns true if retrying the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Routing(RoutingError::Offline | RoutingError::Transport(_))
                | Error::Dns(DnsError::Lookup(_) | DnsError::Timeout)
        )
    }
}

impl From<namesys_common::path::Error> for Error {
    fn from(error: namesys_common::path::Error) -> Self {
        Error::InvalidName(error.to_string())
    }
}

/// Errors reported by a routing substrate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// No value stored under the key.
    #[error("No value found for {0}")]
    NotFound(String),

    /// The substrate is not reachable.
    #[error("Routing is offline")]
    Offline,

    /// The value was refused by the substrate's validator.
    #[error("Value rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// Any other transport failure, passed through as text.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors from DNS TXT lookups.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The nameserver could not be reached or gave an unusable answer.
    #[error("DNS lookup failed: {0}")]
    Lookup(#[from] hickory_resolver::ResolveError),

    /// The nameserver did not answer in time.
    #[error("DNS query timed out")]
    Timeout,

    /// The domain has no TXT records.
    #[error("No TXT records for {0}")]
    NoRecords(String),

    /// TXT records exist but none is a usable link.
    #[error("No dnslink entry found for {0}")]
    NoLink(String),
}

/// Errors from a [crate::Keystore].
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// No key stored under the alias.
    #[error("No key named {0}")]
    NotFound(String),

    /// An entry already exists under the alias.
    #[error("Key {0} already exists")]
    AlreadyExists(String),

    /// The alias is not acceptable as a key name.
    #[error("Invalid key name {0:?}")]
    InvalidName(String),

    /// Filesystem failure.
    #[error("Keystore I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a [crate::Datastore].
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// Filesystem failure.
    #[error("Datastore I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
