//! Session identifiers.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of one streaming session.
///
/// Chosen by the initiator when the session is requested and never changed
/// afterwards. The ledger contract stores it as a `uint256`, so the full range
/// is representable even though locally generated ids stay below `2^63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(U256);

impl SessionId {
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Narrow to `u64` for transports that carry the id as a JSON number.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for SessionId {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session id {input:?}: expected a non-negative decimal integer")]
pub struct ParseSessionIdError {
    pub input: String,
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseSessionIdError { input: s.to_string() });
        }

        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|_| ParseSessionIdError { input: s.to_string() })
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: SessionId = "9223372036854775806".parse().unwrap();
        assert_eq!(id.to_string(), "9223372036854775806");
        assert_eq!(id.to_u64(), Some(9_223_372_036_854_775_806));
    }

    #[test]
    fn test_rejects_hex_and_signs() {
        assert!("0x10".parse::<SessionId>().is_err());
        assert!("-1".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_to_u64_overflow() {
        let id = SessionId::new(U256::from(u64::MAX) + U256::from(1u8));
        assert_eq!(id.to_u64(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let id = SessionId::from_u64(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"42\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
