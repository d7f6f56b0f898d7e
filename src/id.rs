//! ULID-style identifiers.
//!
//! The data model calls for an "opaque 128-bit identifier, lexicographically
//! time-sortable" primary key. Rather than pull in a dedicated crate for
//! this, the encoding is implemented directly on top of `chrono` and `rand`
//! (both already depended on by the store and embedder layers): 48 bits of
//! millisecond Unix time followed by 80 bits of randomness, rendered as
//! 26-character Crockford base32, matching the canonical ULID layout.

use rand::RngCore;
use std::fmt;

const CROCKFORD_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// A 128-bit, lexicographically time-sortable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MemoryId([u8; 16]);

impl MemoryId {
    /// Generates a new id from the current wall clock time.
    pub fn new() -> Self {
        Self::from_millis(chrono::Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Generates a new id stamped with an explicit millisecond timestamp.
    /// Exposed for deterministic tests.
    pub fn from_millis(millis: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0] = (millis >> 40) as u8;
        bytes[1] = (millis >> 32) as u8;
        bytes[2] = (millis >> 24) as u8;
        bytes[3] = (millis >> 16) as u8;
        bytes[4] = (millis >> 8) as u8;
        bytes[5] = millis as u8;
        rand::thread_rng().fill_bytes(&mut bytes[6..]);
        Self(bytes)
    }

    pub fn to_crockford(&self) -> String {
        encode_crockford(&self.0)
    }

    pub fn parse(s: &str) -> Result<Self, InvalidMemoryId> {
        let bytes = decode_crockford(s).ok_or(InvalidMemoryId)?;
        Ok(Self(bytes))
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_crockford())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InvalidMemoryId;

impl fmt::Display for InvalidMemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid memory id")
    }
}

impl std::error::Error for InvalidMemoryId {}

impl From<MemoryId> for String {
    fn from(id: MemoryId) -> Self {
        id.to_crockford()
    }
}

impl TryFrom<String> for MemoryId {
    type Error = InvalidMemoryId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MemoryId::parse(&value)
    }
}

impl std::str::FromStr for MemoryId {
    type Err = InvalidMemoryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryId::parse(s)
    }
}

fn encode_crockford(bytes: &[u8; 16]) -> String {
    // 128 bits -> 26 base32 characters (130 bits, top 2 bits unused).
    let mut value: u128 = 0;
    for b in bytes {
        value = (value << 8) | *b as u128;
    }
    let mut out = vec![0u8; 26];
    for i in (0..26).rev() {
        out[i] = CROCKFORD_ALPHABET[(value & 0x1f) as usize];
        value >>= 5;
    }
    String::from_utf8(out).expect("crockford alphabet is ASCII")
}

fn decode_crockford(s: &str) -> Option<[u8; 16]> {
    if s.len() != 26 {
        return None;
    }
    let mut value: u128 = 0;
    for c in s.chars() {
        let digit = crockford_value(c)?;
        value = (value << 5) | digit as u128;
    }
    let mut bytes = [0u8; 16];
    for i in (0..16).rev() {
        bytes[i] = (value & 0xff) as u8;
        value >>= 8;
    }
    Some(bytes)
}

fn crockford_value(c: char) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    CROCKFORD_ALPHABET.iter().position(|&b| b as char == c).map(|p| p as u8)
}

/// Whitelist regex-equivalent used by `delete`: `[A-Za-z0-9_-]{1,64}`.
/// Implemented as a direct character scan since the privacy filter
/// already establishes the no-regex convention for this crate.
pub fn is_valid_raw_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_crockford() {
        let id = MemoryId::from_millis(1_700_000_000_000);
        let encoded = id.to_crockford();
        assert_eq!(encoded.len(), 26);
        let decoded = MemoryId::parse(&encoded).unwrap();
        assert_eq!(id, decoded);
    }

    #[test]
    fn is_lexicographically_time_sortable() {
        let earlier = MemoryId::from_millis(1000);
        let later = MemoryId::from_millis(2000);
        assert!(earlier.to_crockford() < later.to_crockford());
        assert!(earlier < later);
    }

    #[test]
    fn validates_raw_ids() {
        assert!(is_valid_raw_id("abc-123_XYZ"));
        assert!(!is_valid_raw_id(""));
        assert!(!is_valid_raw_id("has space"));
        assert!(!is_valid_raw_id(&"a".repeat(65)));
    }
}
