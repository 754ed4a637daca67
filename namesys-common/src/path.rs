//! Validated `/<namespace>/<key>[/<rest>]` paths.

use core::fmt;
use core::str::FromStr;

use crate::multihash::Multihash;

/// Prefix of immutable, content-addressed paths.
pub const IPFS_PREFIX: &str = "/ipfs/";
/// Prefix of mutable, name-addressed paths.
pub const IPNS_PREFIX: &str = "/ipns/";

/// A path into the content-addressed (`/ipfs/`) or naming (`/ipns/`) namespace.
///
/// Construction checks the shape only: a leading `/`, a namespace and a non-empty key
/// segment. Keys under `/ipfs/` must be valid [Multihash]es.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path(String);

impl Path {
    /// Parse a path.
    ///
    /// A bare content id without a leading `/` is accepted and turned into `/ipfs/<id>`.
    pub fn parse(value: &str) -> Result<Self, Error> {
        if !value.starts_with('/') {
            return match Multihash::from_z32(value) {
                Ok(hash) => Ok(Self::from_content(&hash)),
                Err(_) => Err(Error::NotAbsolute(value.to_string())),
            };
        }

        let mut segments = value.split('/').skip(1);
        let namespace = segments.next().unwrap_or_default();
        let key = segments.next().unwrap_or_default();
        if namespace.is_empty() || key.is_empty() {
            return Err(Error::TooShort(value.to_string()));
        }

        if namespace == "ipfs" && Multihash::from_z32(key).is_err() {
            return Err(Error::InvalidContentId(key.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    /// `/ipfs/<hash>`.
    pub fn from_content(hash: &Multihash) -> Self {
        Self(format!("{IPFS_PREFIX}{hash}"))
    }

    /// Join `prefix` and `segments` with `/` and parse the result.
    pub fn from_segments(prefix: &str, segments: &[&str]) -> Result<Self, Error> {
        Self::parse(&format!("{prefix}{}", segments.join("/")))
    }

    /// Append a residual path, keeping exactly one `/` between the parts.
    pub fn join(&self, residual: &str) -> Result<Self, Error> {
        Self::from_segments("", &[self.0.trim_end_matches('/'), residual])
    }

    /// Interpret the `value` of a name record.
    ///
    /// Old records store a raw [Multihash] instead of a path string.
    pub fn from_record_value(value: &[u8]) -> Result<Self, Error> {
        if let Ok(hash) = Multihash::from_bytes(value) {
            tracing::debug!("encountered raw hash record value: {hash}");
            return Ok(Self::from_content(&hash));
        }

        let text = core::str::from_utf8(value).map_err(|_| Error::NotUtf8)?;
        Self::parse(text)
    }

    /// The namespace, e.g. `ipfs` or `ipns`.
    pub fn namespace(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }

    /// Whether this path points into the mutable `/ipns/` namespace.
    pub fn is_ipns(&self) -> bool {
        self.0.starts_with(IPNS_PREFIX)
    }

    /// Whether this path is already fully resolved content.
    pub fn is_ipfs(&self) -> bool {
        self.0.starts_with(IPFS_PREFIX)
    }

    /// Path segments without the leading empty one.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').skip(1).collect()
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow as bytes, the form stored in a record's `value`.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Path").field(&self.0).finish()
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Error parsing a [Path].
pub enum Error {
    #[error("Path `{0}` does not start with `/`")]
    /// Missing leading `/`
    NotAbsolute(String),
    #[error("Path `{0}` needs a namespace and a key")]
    /// Missing namespace or key segment
    TooShort(String),
    #[error("`{0}` is not a valid content id")]
    /// Invalid `/ipfs/` key
    InvalidContentId(String),
    #[error("Record value is not valid UTF-8")]
    /// Record value is not a string
    NotUtf8,
}
