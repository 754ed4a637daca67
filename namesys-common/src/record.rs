//! Signed, versioned name records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use prost::Message;

use crate::{
    codec::{decode_entry, DecodeError, IpnsEntry},
    crypto::{public_key_from_bytes, signature_from_bytes, Keypair, PublicKey},
    key_book::KeyBook,
    path::Path,
    peer_id::PeerId,
    timestamp::{format_rfc3339, parse_rfc3339_bytes},
    validator::ValidationError,
};

/// How a record's `validity` field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidityType {
    /// `validity` is an RFC3339 end-of-life instant.
    #[default]
    Eol,
    /// Any value this implementation does not understand.
    Other(i32),
}

impl ValidityType {
    const fn to_wire(self) -> i32 {
        match self {
            ValidityType::Eol => 0,
            ValidityType::Other(n) => n,
        }
    }

    const fn from_wire(value: i32) -> Self {
        match value {
            0 => ValidityType::Eol,
            n => ValidityType::Other(n),
        }
    }

    /// The form that is fed into the signature.
    pub fn signable(&self) -> String {
        match self {
            ValidityType::Eol => "EOL".to_string(),
            ValidityType::Other(n) => n.to_string(),
        }
    }
}

/// A name binding: `value` signed by the owner of the name, valid until `validity`.
///
/// Records are never updated in place, a new record with a higher
/// [Record::sequence] supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    value: Vec<u8>,
    signature: Vec<u8>,
    validity_type: ValidityType,
    validity: Vec<u8>,
    sequence: u64,
    ttl: Option<u64>,
    public_key: Option<Vec<u8>>,
}

impl Record {
    /// Create a record pointing at `value`, valid until `eol`, and sign it.
    pub fn sign(keypair: &Keypair, value: &Path, sequence: u64, eol: &DateTime<Utc>) -> Self {
        let mut record = Self {
            value: value.as_bytes().to_vec(),
            signature: Vec::new(),
            validity_type: ValidityType::Eol,
            validity: format_rfc3339(eol).into_bytes(),
            sequence,
            ttl: None,
            public_key: None,
        };

        record.signature = keypair.sign(&record.data_for_sig()).to_bytes().to_vec();

        record
    }

    /// The bytes covered by the signature: `value ‖ validity ‖ validity type`.
    pub fn data_for_sig(&self) -> Vec<u8> {
        let validity_type = self.validity_type.signable();

        let mut data =
            Vec::with_capacity(self.value.len() + self.validity.len() + validity_type.len());
        data.extend_from_slice(&self.value);
        data.extend_from_slice(&self.validity);
        data.extend_from_slice(validity_type.as_bytes());
        data
    }

    /// Embed the signer's public key, needed when the name cannot be reversed into it.
    pub fn embed_public_key(&mut self, public_key: &PublicKey) {
        self.public_key = Some(public_key.as_bytes().to_vec());
    }

    /// Set the suggested cache lifetime. Not covered by the signature.
    pub fn set_ttl(&mut self, ttl: Option<Duration>) {
        self.ttl = ttl.map(|ttl| u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Check the signature against the key of `id`.
    ///
    /// The key comes from the record itself if embedded (and must derive to `id`),
    /// otherwise from `id` if it is inline, otherwise from `key_book`.
    pub fn verify(&self, id: &PeerId, key_book: &KeyBook) -> Result<(), ValidationError> {
        let public_key = self.public_key_for(id, key_book)?;

        let signature = signature_from_bytes(&self.signature).ok_or_else(|| {
            tracing::debug!("malformed signature in record for {id}");
            ValidationError::SignatureInvalid
        })?;

        public_key
            .verify(&self.data_for_sig(), &signature)
            .map_err(|_| {
                tracing::debug!("failed to verify signature for record {id}");
                ValidationError::SignatureInvalid
            })
    }

    fn public_key_for(&self, id: &PeerId, key_book: &KeyBook) -> Result<PublicKey, ValidationError> {
        if let Some(bytes) = &self.public_key {
            let public_key = public_key_from_bytes(bytes).ok_or_else(|| {
                tracing::debug!("public key in record for {id} failed to parse");
                ValidationError::BadPublicKey
            })?;

            if !id.matches_public_key(&public_key) {
                return Err(ValidationError::PublicKeyMismatch);
            }

            return Ok(public_key);
        }

        id.extract_public_key()
            .or_else(|| key_book.public_key(id))
            .ok_or_else(|| {
                tracing::debug!("public key for {id} not found in key book");
                ValidationError::PublicKeyNotFound
            })
    }

    /// Parse the end-of-life instant.
    pub fn eol(&self) -> Result<DateTime<Utc>, ValidationError> {
        match self.validity_type {
            ValidityType::Eol => parse_rfc3339_bytes(&self.validity)
                .map_err(|error| ValidationError::InvalidValidity(error.to_string())),
            ValidityType::Other(_) => Err(ValidationError::UnrecognizedValidity),
        }
    }

    /// Check the end-of-life against `now`.
    pub fn check_expiry(&self, now: &DateTime<Utc>) -> Result<(), ValidationError> {
        if *now > self.eol()? {
            return Err(ValidationError::ExpiredRecord);
        }
        Ok(())
    }

    // === Getters ===

    /// The target this record points at.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// How `validity` is interpreted.
    pub fn validity_type(&self) -> ValidityType {
        self.validity_type
    }

    /// Raw `validity` bytes.
    pub fn validity(&self) -> &[u8] {
        &self.validity
    }

    /// Monotonic version of the record.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Suggested cache lifetime in nanoseconds.
    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    /// Suggested cache lifetime.
    pub fn ttl_duration(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_nanos)
    }

    /// Embedded public key bytes.
    pub fn public_key(&self) -> Option<&[u8]> {
        self.public_key.as_deref()
    }

    // === Wire format ===

    /// Protobuf encoding.
    pub fn encode(&self) -> Vec<u8> {
        IpnsEntry {
            value: Some(self.value.clone()),
            signature: Some(self.signature.clone()),
            validity_type: Some(self.validity_type.to_wire()),
            validity: Some(self.validity.clone()),
            sequence: Some(self.sequence),
            ttl: self.ttl,
            public_key: self.public_key.clone(),
        }
        .encode_to_vec()
    }

    /// Decode the protobuf encoding. Unknown fields are skipped.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let entry = decode_entry(bytes)?;

        Ok(Self {
            value: entry.value.ok_or(DecodeError::MissingField("value"))?,
            signature: entry
                .signature
                .ok_or(DecodeError::MissingField("signature"))?,
            validity_type: ValidityType::from_wire(entry.validity_type.unwrap_or_default()),
            validity: entry.validity.unwrap_or_default(),
            sequence: entry.sequence.unwrap_or_default(),
            ttl: entry.ttl,
            public_key: entry.public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{multihash::Multihash, peer_id::IdFormat};

    fn target() -> Path {
        Path::from_content(&Multihash::blake3(b"hello"))
    }

    fn signed(format: IdFormat) -> (Keypair, PeerId, Record) {
        let keypair = Keypair::random();
        let id = PeerId::from_public_key(&keypair.public_key(), format);
        let record = Record::sign(&keypair, &target(), 1, &(Utc::now() + ChronoDuration::hours(1)));
        (keypair, id, record)
    }

    #[test]
    fn sign_and_verify() {
        let (_, id, record) = signed(IdFormat::Inline);

        assert_eq!(record.validity_type(), ValidityType::Eol);
        assert_eq!(record.value(), target().as_bytes());
        record.verify(&id, &KeyBook::default()).unwrap();
        record.check_expiry(&Utc::now()).unwrap();
    }

    #[test]
    fn mutating_signed_fields_breaks_signature() {
        let (_, id, record) = signed(IdFormat::Inline);
        let key_book = KeyBook::default();

        let mut value = record.clone();
        value.value = b"/ipfs/other".to_vec();
        assert_eq!(
            value.verify(&id, &key_book),
            Err(ValidationError::SignatureInvalid)
        );

        let mut validity = record.clone();
        validity.validity = format_rfc3339(&(Utc::now() + ChronoDuration::days(365))).into_bytes();
        assert_eq!(
            validity.verify(&id, &key_book),
            Err(ValidationError::SignatureInvalid)
        );

        let mut validity_type = record.clone();
        validity_type.validity_type = ValidityType::Other(1);
        assert_eq!(
            validity_type.verify(&id, &key_book),
            Err(ValidationError::SignatureInvalid)
        );

        // The sequence and ttl are not signed.
        let mut sequence = record;
        sequence.sequence = 42;
        sequence.set_ttl(Some(Duration::from_secs(5)));
        sequence.verify(&id, &key_book).unwrap();
    }

    #[test]
    fn hashed_id_needs_a_key() {
        let (keypair, id, mut record) = signed(IdFormat::Hashed);

        assert_eq!(
            record.verify(&id, &KeyBook::default()),
            Err(ValidationError::PublicKeyNotFound)
        );

        let key_book = KeyBook::default();
        key_book.add(id, keypair.public_key());
        record.verify(&id, &key_book).unwrap();

        record.embed_public_key(&keypair.public_key());
        record.verify(&id, &KeyBook::default()).unwrap();
    }

    #[test]
    fn embedded_key_must_match_id() {
        let (_, _, mut record) = signed(IdFormat::Hashed);
        let other = Keypair::random();
        record.embed_public_key(&other.public_key());

        let (_, id, _) = signed(IdFormat::Hashed);
        assert_eq!(
            record.verify(&id, &KeyBook::default()),
            Err(ValidationError::PublicKeyMismatch)
        );

        record.public_key = Some(vec![1, 2, 3]);
        assert_eq!(
            record.verify(&id, &KeyBook::default()),
            Err(ValidationError::BadPublicKey)
        );
    }

    #[test]
    fn expiry() {
        let keypair = Keypair::random();
        let record = Record::sign(&keypair, &target(), 1, &(Utc::now() - ChronoDuration::hours(1)));

        assert_eq!(
            record.check_expiry(&Utc::now()),
            Err(ValidationError::ExpiredRecord)
        );

        let mut garbage = record.clone();
        garbage.validity = b"not a date".to_vec();
        assert!(matches!(
            garbage.check_expiry(&Utc::now()),
            Err(ValidationError::InvalidValidity(_))
        ));

        let mut unknown = record;
        unknown.validity_type = ValidityType::Other(7);
        assert_eq!(
            unknown.check_expiry(&Utc::now()),
            Err(ValidationError::UnrecognizedValidity)
        );
    }

    #[test]
    fn encode_decode() {
        let (keypair, _, record) = signed(IdFormat::Hashed);
        assert_eq!(Record::decode(&record.encode()).unwrap(), record);

        let mut full = record;
        full.embed_public_key(&keypair.public_key());
        full.set_ttl(Some(Duration::from_secs(30)));
        full.validity_type = ValidityType::Other(-1);

        let decoded = Record::decode(&full.encode()).unwrap();
        assert_eq!(decoded, full);
        assert_eq!(decoded.ttl_duration(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn encoding_sets_the_signed_fields() {
        let (_, _, record) = signed(IdFormat::Inline);
        let entry = IpnsEntry::decode(record.encode().as_slice()).unwrap();

        assert_eq!(entry.value.as_deref(), Some(record.value()));
        assert_eq!(entry.validity_type, Some(0));
        assert_eq!(entry.sequence, Some(1));
        assert_eq!(entry.ttl, None);
        assert_eq!(entry.public_key, None);
    }

    #[test]
    fn decode_errors() {
        assert_eq!(
            Record::decode(&[]),
            Err(DecodeError::MissingField("value"))
        );

        let mut encoded = IpnsEntry {
            value: Some(b"/ipfs/x".to_vec()),
            ..Default::default()
        }
        .encode_to_vec();
        // field 99, varint 1
        encoded.extend_from_slice(&[0x98, 0x06, 0x01]);
        assert_eq!(
            Record::decode(&encoded),
            Err(DecodeError::MissingField("signature"))
        );

        // field 1 as a varint
        assert!(matches!(
            Record::decode(&[0x08, 0x01]),
            Err(DecodeError::Protobuf(_))
        ));
    }
}
