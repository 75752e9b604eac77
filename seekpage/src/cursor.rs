//! Opaque cursor tokens
//!
//! A token carries a [`Boundary`]: the sort-column values of the row a page
//! ended (or started) on, the direction it navigates, and a [`Fingerprint`] of
//! the entity, sort and filter that produced it. On the wire it is
//!
//! ```text
//! base64url( version:1 | blake3-keyed-mac:32 | json payload )
//! ```
//!
//! The MAC covers the version byte and payload, so any modification is
//! detected before the payload is parsed. Decoding is total: every malformed
//! input maps to [`QueryError::InvalidToken`], and a token minted for a
//! different sort or filter maps to [`QueryError::StaleToken`].
//!
//! # Example
//!
//! ```rust
//! use seekpage::cursor::{Boundary, CursorCodec, Fingerprint, NavDirection};
//! use seekpage::query::Value;
//!
//! let codec = CursorCodec::new("a long random secret");
//! let fingerprint = Fingerprint::from_parts("users", "id ASC", "");
//! let boundary = Boundary::new(
//!     fingerprint.clone(),
//!     NavDirection::Forward,
//!     vec![("id".to_string(), Value::Identifier("usr_42".to_string()))],
//! );
//!
//! let token = codec.encode(&boundary).unwrap();
//! let decoded = codec.decode(&token, NavDirection::Forward, &fingerprint).unwrap();
//! assert_eq!(decoded, boundary);
//! ```

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::query::{FilterExpression, QueryError, SortSpec, Value};

/// Token format version; bump when the payload layout changes
const TOKEN_VERSION: u8 = 1;

const MAC_LEN: usize = blake3::OUT_LEN;

const HEADER_LEN: usize = 1 + MAC_LEN;

/// Context string for deriving the MAC key from the configured secret
const KEY_CONTEXT: &str = "seekpage cursor token v1";

/// Default upper bound on accepted token length, in characters
pub const MAX_TOKEN_LEN: usize = 2048;

/// Which way a cursor moves through the ordered result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavDirection {
    /// Rows after the boundary (`next_token`)
    #[serde(rename = "f")]
    Forward,
    /// Rows before the boundary (`prev_token`)
    #[serde(rename = "b")]
    Backward,
}

impl fmt::Display for NavDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Digest identifying the entity, sort and filter a token belongs to
///
/// Projection and page size are not part of it: a client may
/// change either while paging without invalidating its cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a validated request
    #[must_use]
    pub fn compute(entity: &str, sort: &SortSpec, filter: Option<&FilterExpression>) -> Self {
        let filter = filter.map(ToString::to_string).unwrap_or_default();
        Self::from_parts(entity, &sort.to_string(), &filter)
    }

    /// Fingerprint over canonical sort and filter text
    #[must_use]
    pub fn from_parts(entity: &str, sort: &str, filter: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(entity.as_bytes());
        hasher.update(b"|");
        hasher.update(sort.as_bytes());
        hasher.update(b"|");
        hasher.update(filter.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(hex.as_str()[..32].to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded content of a cursor token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Boundary {
    #[serde(rename = "f")]
    pub fingerprint: Fingerprint,
    #[serde(rename = "d")]
    pub direction: NavDirection,
    /// Sort-column values in sort-spec order, identifier last
    #[serde(rename = "k")]
    pub keys: Vec<(String, Value)>,
}

impl Boundary {
    pub fn new(
        fingerprint: Fingerprint,
        direction: NavDirection,
        keys: Vec<(String, Value)>,
    ) -> Self {
        Self {
            fingerprint,
            direction,
            keys,
        }
    }

    /// Boundary value of one sort column
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.keys.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }
}

/// Encodes and verifies cursor tokens with a keyed blake3 MAC
#[derive(Clone)]
pub struct CursorCodec {
    key: [u8; 32],
    max_token_len: usize,
}

impl fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorCodec")
            .field("key", &"<redacted>")
            .field("max_token_len", &self.max_token_len)
            .finish()
    }
}

impl CursorCodec {
    /// Codec keyed from a shared secret
    ///
    /// Every instance that must accept each other's tokens needs the same secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_ref()),
            max_token_len: MAX_TOKEN_LEN,
        }
    }

    /// Codec with a random per-process key
    ///
    /// Tokens become invalid when the process restarts.
    #[must_use]
    pub fn random() -> Self {
        Self {
            key: rand::rng().random(),
            max_token_len: MAX_TOKEN_LEN,
        }
    }

    /// Reject tokens longer than `len` characters before decoding them
    #[must_use]
    pub fn with_max_token_len(mut self, len: usize) -> Self {
        self.max_token_len = len;
        self
    }

    #[must_use]
    pub const fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    /// Serialize and sign a boundary
    ///
    /// A token longer than [`max_token_len`](Self::max_token_len) is refused here,
    /// so every token this codec issues is one it accepts.
    pub fn encode(&self, boundary: &Boundary) -> Result<String, QueryError> {
        let payload = serde_json::to_vec(boundary).map_err(|e| QueryError::TokenEncoding {
            message: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.push(TOKEN_VERSION);
        bytes.extend_from_slice(self.mac(TOKEN_VERSION, &payload).as_bytes());
        bytes.extend_from_slice(&payload);

        let token = URL_SAFE_NO_PAD.encode(bytes);
        if token.len() > self.max_token_len {
            return Err(QueryError::TokenEncoding {
                message: format!(
                    "token of {} characters exceeds the {} character limit",
                    token.len(),
                    self.max_token_len
                ),
            });
        }
        Ok(token)
    }

    /// Verify a token and return its boundary without checking what it is for
    pub fn open(&self, token: &str) -> Result<Boundary, QueryError> {
        if token.is_empty() || token.len() > self.max_token_len {
            return Err(reject("length"));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| reject("encoding"))?;
        if bytes.len() <= HEADER_LEN {
            return Err(reject("truncated"));
        }

        let (header, payload) = bytes.split_at(HEADER_LEN);
        let version = header[0];
        if version != TOKEN_VERSION {
            return Err(reject("version"));
        }

        let mut presented = [0u8; MAC_LEN];
        presented.copy_from_slice(&header[1..]);
        if blake3::Hash::from(presented) != self.mac(version, payload) {
            return Err(reject("signature"));
        }

        serde_json::from_slice(payload).map_err(|_| reject("payload"))
    }

    /// Verify a token supplied for `direction` against the current request's fingerprint
    pub fn decode(
        &self,
        token: &str,
        direction: NavDirection,
        fingerprint: &Fingerprint,
    ) -> Result<Boundary, QueryError> {
        let boundary = self.open(token)?;
        if boundary.direction != direction {
            return Err(reject("direction"));
        }
        if &boundary.fingerprint != fingerprint {
            tracing::warn!("Rejected pagination token issued for a different sort or filter");
            return Err(QueryError::StaleToken);
        }
        Ok(boundary)
    }

    fn mac(&self, version: u8, payload: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&[version]);
        hasher.update(payload);
        hasher.finalize()
    }
}

fn reject(reason: &'static str) -> QueryError {
    tracing::warn!(reason, "Rejected invalid pagination token");
    QueryError::InvalidToken
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fingerprint() -> Fingerprint {
        Fingerprint::from_parts("users", "created_at ASC, id ASC", "")
    }

    fn boundary(direction: NavDirection) -> Boundary {
        Boundary::new(
            fingerprint(),
            direction,
            vec![
                (
                    "created_at".to_string(),
                    Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
                ),
                ("id".to_string(), Value::Identifier("usr_3".to_string())),
            ],
        )
    }

    #[test]
    fn test_round_trip() {
        let codec = CursorCodec::new("secret");
        for direction in [NavDirection::Forward, NavDirection::Backward] {
            let original = boundary(direction);
            let token = codec.encode(&original).unwrap();
            let decoded = codec.decode(&token, direction, &fingerprint()).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_round_trip_all_value_types() {
        let codec = CursorCodec::new("secret");
        let original = Boundary::new(
            fingerprint(),
            NavDirection::Forward,
            vec![
                ("a".to_string(), Value::from("O'Brien \"quoted\" ✓")),
                ("b".to_string(), Value::Integer(i64::MIN)),
                ("c".to_string(), Value::Boolean(true)),
                ("id".to_string(), Value::Identifier(String::new())),
            ],
        );
        let token = codec.encode(&original).unwrap();
        assert_eq!(codec.open(&token).unwrap(), original);
    }

    #[test]
    fn test_token_is_url_safe() {
        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn test_every_character_flip_is_detected() {
        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();

        for i in 0..token.len() {
            let mut chars: Vec<char> = token.chars().collect();
            chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
            let tampered: String = chars.into_iter().collect();
            assert_eq!(
                codec.decode(&tampered, NavDirection::Forward, &fingerprint()),
                Err(QueryError::InvalidToken),
                "flip at {i}"
            );
        }
    }

    #[test]
    fn test_every_byte_flip_is_detected() {
        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();
        let bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(tampered);
            assert_eq!(codec.open(&tampered), Err(QueryError::InvalidToken), "byte {i}");
        }
    }

    #[test]
    fn test_other_key_is_rejected() {
        let token = CursorCodec::new("one")
            .encode(&boundary(NavDirection::Forward))
            .unwrap();
        assert_eq!(
            CursorCodec::new("two").open(&token),
            Err(QueryError::InvalidToken)
        );
        assert_eq!(CursorCodec::random().open(&token), Err(QueryError::InvalidToken));
    }

    #[test]
    fn test_garbage_is_invalid_not_a_panic() {
        let codec = CursorCodec::new("secret");
        let long = "A".repeat(MAX_TOKEN_LEN + 1);
        for garbage in ["", "!!!", "AAAA", "not a token", "eyJmIjoiYSJ9", "AQ", long.as_str()] {
            assert_eq!(codec.open(garbage), Err(QueryError::InvalidToken), "{garbage:?}");
        }
    }

    #[test]
    fn test_signed_but_malformed_payload_is_invalid() {
        let codec = CursorCodec::new("secret");
        let payload = br#"{"f":"x","d":"f","k":[],"extra":1}"#;
        let mut bytes = vec![TOKEN_VERSION];
        bytes.extend_from_slice(codec.mac(TOKEN_VERSION, payload).as_bytes());
        bytes.extend_from_slice(payload);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        assert_eq!(codec.open(&token), Err(QueryError::InvalidToken));
    }

    #[test]
    fn test_unknown_version_is_invalid() {
        let codec = CursorCodec::new("secret");
        let payload = serde_json::to_vec(&boundary(NavDirection::Forward)).unwrap();
        let mut bytes = vec![TOKEN_VERSION + 1];
        bytes.extend_from_slice(codec.mac(TOKEN_VERSION + 1, &payload).as_bytes());
        bytes.extend_from_slice(&payload);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        assert_eq!(codec.open(&token), Err(QueryError::InvalidToken));
    }

    #[test]
    fn test_direction_mismatch_is_invalid() {
        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();
        assert_eq!(
            codec.decode(&token, NavDirection::Backward, &fingerprint()),
            Err(QueryError::InvalidToken)
        );
    }

    #[test]
    fn test_fingerprint_mismatch_is_stale() {
        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();
        let other = Fingerprint::from_parts("users", "created_at DESC, id ASC", "");
        assert_eq!(
            codec.decode(&token, NavDirection::Forward, &other),
            Err(QueryError::StaleToken)
        );
    }

    #[test]
    fn test_max_token_len_is_enforced() {
        let codec = CursorCodec::new("secret").with_max_token_len(16);
        let token = CursorCodec::new("secret")
            .encode(&boundary(NavDirection::Forward))
            .unwrap();
        assert!(token.len() > 16);
        assert_eq!(codec.open(&token), Err(QueryError::InvalidToken));
    }

    #[test]
    fn test_encode_refuses_tokens_open_would_reject() {
        let codec = CursorCodec::new("secret").with_max_token_len(64);
        let long = Boundary::new(
            fingerprint(),
            NavDirection::Forward,
            vec![("first_name".to_string(), Value::from("x".repeat(200)))],
        );
        assert!(matches!(
            codec.encode(&long),
            Err(QueryError::TokenEncoding { .. })
        ));

        let codec = CursorCodec::new("secret");
        let token = codec.encode(&boundary(NavDirection::Forward)).unwrap();
        assert!(token.len() <= codec.max_token_len());
        assert!(codec.open(&token).is_ok());
    }

    #[test]
    fn test_fingerprint_separates_entity_sort_and_filter() {
        let base = Fingerprint::from_parts("users", "id ASC", "");
        assert_eq!(base, Fingerprint::from_parts("users", "id ASC", ""));
        assert_ne!(base, Fingerprint::from_parts("projects", "id ASC", ""));
        assert_ne!(base, Fingerprint::from_parts("users", "id DESC", ""));
        assert_ne!(base, Fingerprint::from_parts("users", "id ASC", "age > 1"));
        assert_eq!(base.as_str().len(), 32);
    }

    #[test]
    fn test_debug_redacts_key() {
        let codec = CursorCodec::new("secret");
        assert!(format!("{codec:?}").contains("<redacted>"));
    }
}
