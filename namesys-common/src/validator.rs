//! Validation of values stored in the routing substrate, per key namespace.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::Utc;

use crate::{
    codec::DecodeError,
    crypto::public_key_from_bytes,
    key_book::KeyBook,
    peer_id::{PeerId, IPNS_NAMESPACE, PK_NAMESPACE},
    record::Record,
    selector::select_encoded,
};

/// Checks and ranks the values stored under a routing key.
pub trait Validator: Debug + Send + Sync {
    /// Accept or reject `value` for `key`.
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError>;

    /// Index of the best of `values` for `key`.
    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError>;
}

/// Split `/<namespace>/<rest>` into its two parts.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (namespace, rest) = key.strip_prefix('/')?.split_once('/')?;
    if namespace.is_empty() || rest.is_empty() {
        return None;
    }
    Some((namespace, rest))
}

/// Validates name records under `/ipns/<id>`.
#[derive(Debug, Clone, Default)]
pub struct IpnsValidator {
    key_book: KeyBook,
}

impl IpnsValidator {
    /// Validator that looks up non-embedded keys in `key_book`.
    pub fn new(key_book: KeyBook) -> Self {
        Self { key_book }
    }

    /// The key book consulted for hashed identities.
    pub fn key_book(&self) -> &KeyBook {
        &self.key_book
    }
}

impl Validator for IpnsValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        let id = match split_key(key) {
            Some((IPNS_NAMESPACE, id)) => id,
            _ => return Err(ValidationError::InvalidPath),
        };

        let record = Record::decode(value)?;

        let id: PeerId = id.parse().map_err(|_| {
            tracing::debug!("failed to parse record key {id} into an identity");
            ValidationError::KeyFormat
        })?;

        record.verify(&id, &self.key_book)?;

        record.check_expiry(&Utc::now())
    }

    fn select(&self, _key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        select_encoded(values)
    }
}

/// Validates raw public keys under `/pk/<id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicKeyValidator;

impl Validator for PublicKeyValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        let id = match split_key(key) {
            Some((PK_NAMESPACE, id)) => id,
            _ => return Err(ValidationError::InvalidPath),
        };
        let id: PeerId = id.parse().map_err(|_| ValidationError::KeyFormat)?;

        let public_key = public_key_from_bytes(value).ok_or(ValidationError::BadPublicKey)?;

        if !id.matches_public_key(&public_key) {
            return Err(ValidationError::PublicKeyMismatch);
        }

        Ok(())
    }

    fn select(&self, _key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        // Every valid value for a key is the same key.
        if values.is_empty() {
            return Err(ValidationError::NoUsableRecords);
        }
        Ok(0)
    }
}

/// Dispatches to a [Validator] by the first segment of the key.
#[derive(Debug, Clone, Default)]
pub struct NamespacedValidator {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl NamespacedValidator {
    /// `ipns` and `pk` validators sharing `key_book`.
    pub fn with_key_book(key_book: KeyBook) -> Self {
        let mut validator = Self::default();
        validator
            .insert(IPNS_NAMESPACE, IpnsValidator::new(key_book))
            .insert(PK_NAMESPACE, PublicKeyValidator);
        validator
    }

    /// Register `validator` for `namespace`.
    pub fn insert(&mut self, namespace: &str, validator: impl Validator + 'static) -> &mut Self {
        self.validators
            .insert(namespace.to_string(), Arc::new(validator));
        self
    }

    fn validator_for(&self, key: &str) -> Result<&Arc<dyn Validator>, ValidationError> {
        let (namespace, _) = split_key(key).ok_or(ValidationError::InvalidPath)?;
        self.validators
            .get(namespace)
            .ok_or(ValidationError::InvalidPath)
    }
}

impl Validator for NamespacedValidator {
    fn validate(&self, key: &str, value: &[u8]) -> Result<(), ValidationError> {
        self.validator_for(key)?.validate(key, value)
    }

    fn select(&self, key: &str, values: &[Vec<u8>]) -> Result<usize, ValidationError> {
        self.validator_for(key)?.select(key, values)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Why a record (or key) was rejected.
pub enum ValidationError {
    #[error("Record path invalid")]
    /// The key is not in the expected namespace
    InvalidPath,
    #[error("Record key could not be parsed into an identity")]
    /// The key's identity segment is malformed
    KeyFormat,
    #[error("Record could not be decoded: {0}")]
    /// The value is not a valid record
    BadRecord(#[from] DecodeError),
    #[error("Record signature verification failed")]
    /// Bad signature
    SignatureInvalid,
    #[error("Public key not found")]
    /// No key to check the signature with
    PublicKeyNotFound,
    #[error("Public key in record did not match expected identity")]
    /// The embedded key belongs to someone else
    PublicKeyMismatch,
    #[error("Public key could not be parsed")]
    /// Embedded or published key bytes are malformed
    BadPublicKey,
    #[error("Expired record")]
    /// The end-of-life has passed
    ExpiredRecord,
    #[error("Unrecognized validity type")]
    /// Validity type other than EOL
    UnrecognizedValidity,
    #[error("Invalid record EOL: {0}")]
    /// EOL could not be parsed
    InvalidValidity(String),
    #[error("No usable records in given set")]
    /// The selector found nothing eligible
    NoUsableRecords,
}
