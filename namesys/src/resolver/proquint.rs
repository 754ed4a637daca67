//! Names that are their own target, spelled as proquints.
//!
//! A quint is five letters, consonant-vowel-consonant-vowel-consonant, carrying 16 bits.
//! Quints are joined with `-`.

use std::time::Duration;

use async_trait::async_trait;
use namesys_common::Path;

use super::{ResolveOnce, ResolveOptions, Resolved};
use crate::errors::{Error, Result};

const CONSONANTS: &[u8; 16] = b"bdfghjklmnprstvz";
const VOWELS: &[u8; 4] = b"aiou";

fn consonant(c: u8) -> Option<u16> {
    CONSONANTS.iter().position(|&x| x == c).map(|i| i as u16)
}

fn vowel(c: u8) -> Option<u16> {
    VOWELS.iter().position(|&x| x == c).map(|i| i as u16)
}

fn decode_quint(quint: &[u8]) -> Option<u16> {
    let [c1, v1, c2, v2, c3] = quint else {
        return None;
    };

    Some(
        consonant(*c1)? << 12
            | vowel(*v1)? << 10
            | consonant(*c2)? << 6
            | vowel(*v2)? << 4
            | consonant(*c3)?,
    )
}

fn encode_quint(n: u16, out: &mut String) {
    let c = |shift: u16| CONSONANTS[usize::from((n >> shift) & 0xf)] as char;
    let v = |shift: u16| VOWELS[usize::from((n >> shift) & 0x3)] as char;
    out.extend([c(12), v(10), c(6), v(4), c(0)]);
}

/// Whether `value` is a well-formed, `-` separated sequence of quints.
pub fn is_proquint(value: &str) -> bool {
    decode(value).is_some()
}

/// Spell `bytes` as proquints. An odd trailing byte is padded with a zero byte.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, pair) in bytes.chunks(2).enumerate() {
        if i > 0 {
            out.push('-');
        }
        let low = pair.get(1).copied().unwrap_or_default();
        encode_quint(u16::from_be_bytes([pair[0], low]), &mut out);
    }
    out
}

/// Bytes spelled by `value`, two per quint.
pub fn decode(value: &str) -> Option<Vec<u8>> {
    if value.is_empty() {
        return None;
    }

    value
        .split('-')
        .map(|quint| decode_quint(quint.as_bytes()).map(u16::to_be_bytes))
        .try_fold(Vec::new(), |mut bytes, pair| {
            bytes.extend(pair?);
            Some(bytes)
        })
}

/// Resolves proquint-spelled paths without any lookup.
///
/// Answers are never cached, decoding is cheaper than a cache entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProquintResolver;

#[async_trait]
impl ResolveOnce for ProquintResolver {
    async fn resolve_once(&self, key: &str, _options: &ResolveOptions) -> Result<Resolved> {
        let bytes = decode(key).ok_or_else(|| Error::InvalidName(key.to_string()))?;

        // Strip the padding of odd-length payloads.
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let text = std::str::from_utf8(&bytes[..end])
            .map_err(|_| Error::ResolveFailed(format!("{key} is not a UTF-8 proquint")))?;

        Ok(Resolved {
            path: Path::parse(text)?,
            ttl: Duration::ZERO,
        })
    }
}
