//! Fixed-width participant identifiers.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte participant or settlement address.
///
/// Ordering is byte-wise lexicographic, which is the same as comparing the
/// bytes as a big-endian unsigned integer and the same as comparing the
/// canonical lowercase hex forms.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Build an address whose last byte is `n`. Handy for fixtures.
    pub const fn from_low_byte(n: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 1] = n;
        Self(bytes)
    }

    /// Canonical lowercase hex form without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

/// Errors parsing an address from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(trimmed).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let len = bytes.len();
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(len))?;
        Ok(Self(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let addr: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr, Address::from_low_byte(0xff));
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ff");
    }

    #[test]
    fn test_parse_without_prefix() {
        let addr: Address = "0100000000000000000000000000000000000000".parse().unwrap();
        assert_eq!(addr.0[0], 1);
    }

    #[test]
    fn test_parse_wrong_length() {
        let err = "0xabcd".parse::<Address>().unwrap_err();
        assert_eq!(err, AddressParseError::InvalidLength(2));
    }

    #[test]
    fn test_ordering_matches_hex_ordering() {
        let a: Address = "0x0a00000000000000000000000000000000000000".parse().unwrap();
        let b: Address = "0x00ff000000000000000000000000000000000000".parse().unwrap();
        assert!(b < a);
        assert!(b.to_hex() < a.to_hex());
    }
}
