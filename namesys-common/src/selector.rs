//! Picking the authoritative record among several candidates for the same name.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::{record::Record, timestamp::parse_rfc3339_bytes, validator::ValidationError};

/// Index of the best record in `records`.
///
/// `records[i]` is the decoded form of `values[i]`, `None` if it failed to decode.
/// Order of precedence: higher sequence, then later validity, then the lexicographically
/// greater raw encoding. Undecodable records and records with an unparsable validity are
/// skipped and can never win.
pub fn select_record(
    records: &[Option<Record>],
    values: &[Vec<u8>],
) -> Result<usize, ValidationError> {
    let mut best: Option<(usize, u64, DateTime<Utc>)> = None;

    for (i, record) in records.iter().enumerate() {
        let Some(record) = record else {
            continue;
        };

        if let Some((_, best_sequence, _)) = best {
            if record.sequence() < best_sequence {
                continue;
            }
        }

        let eol = match parse_rfc3339_bytes(record.validity()) {
            Ok(eol) => eol,
            Err(error) => {
                tracing::warn!("failed to parse record EOL {:?}: {error}", record.validity());
                continue;
            }
        };

        let replace = match best {
            None => true,
            Some((best_i, best_sequence, best_eol)) => match record.sequence().cmp(&best_sequence) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => match eol.cmp(&best_eol) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => raw(values, i) > raw(values, best_i),
                },
            },
        };

        if replace {
            best = Some((i, record.sequence(), eol));
        }
    }

    best.map(|(i, _, _)| i)
        .ok_or(ValidationError::NoUsableRecords)
}

fn raw(values: &[Vec<u8>], i: usize) -> &[u8] {
    values.get(i).map(Vec::as_slice).unwrap_or_default()
}

/// Decode `values` and pick the best one, see [select_record].
pub fn select_encoded(values: &[Vec<u8>]) -> Result<usize, ValidationError> {
    let records: Vec<Option<Record>> = values.iter().map(|v| Record::decode(v).ok()).collect();
    select_record(&records, values)
}
