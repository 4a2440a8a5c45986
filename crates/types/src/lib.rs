//! Core type definitions for chained Diffie-Hellman sealed-bid auctions.
//!
//! This crate provides the shared records used across the protocol engine:
//! group elements exchanged during key agreement, the shared symmetric key,
//! bid commitments and their openings, auction phases and settlement results.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub mod address;

pub use address::{Address, AddressParseError, ADDRESS_LEN};

// =========================
// KEY AGREEMENT
// =========================

/// Compressed G1 point on BLS12-381 (48 bytes)
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Symmetric key derived from the group's final Diffie-Hellman value.
///
/// Every participant that completes the exchange holds the same key.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SharedKey(pub [u8; 32]);

impl SharedKey {
    /// Public fingerprint of the key, safe to publish at auction open.
    pub fn fingerprint(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"SHARED_KEY_FINGERPRINT_V1");
        hasher.update(self.0);
        hasher.finalize().into()
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedKey(fp={})", hex::encode(&self.fingerprint()[..8]))
    }
}

// =========================
// SYMMETRIC ENCRYPTION
// =========================

/// Authenticated ciphertext under a [`SharedKey`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SymmetricCiphertext {
    /// Synthetic nonce (derived from key and plaintext)
    pub nonce: [u8; 12],
    /// Encrypted payload
    pub ciphertext: Vec<u8>,
    /// Authentication tag
    pub tag: [u8; 16],
}

// =========================
// BIDS
// =========================

/// The secret behind a sealed commitment.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidOpening {
    pub value: u64,
    pub salt: [u8; 32],
}

/// What a bidder publishes during the commit phase.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum BidCommitment {
    /// Raw value, used by the plain variant without key agreement
    Plain { value: u64 },
    /// H(value || salt)
    Sealed { hash: [u8; 32] },
}

impl BidCommitment {
    /// Bytes bound into the commitments digest.
    pub fn digest_bytes(&self) -> Vec<u8> {
        match self {
            BidCommitment::Plain { value } => {
                let mut out = Vec::with_capacity(9);
                out.push(0u8);
                out.extend_from_slice(&value.to_le_bytes());
                out
            }
            BidCommitment::Sealed { hash } => {
                let mut out = Vec::with_capacity(33);
                out.push(1u8);
                out.extend_from_slice(hash);
                out
            }
        }
    }
}

/// A bid held by the auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub committer: Address,
    pub commitment: BidCommitment,
    /// Settlement address encrypted under the shared key (mixer variant)
    pub encrypted_address: Option<SymmetricCiphertext>,
    /// Encrypted opening submitted at reveal
    pub sealed_opening: Option<SymmetricCiphertext>,
    pub revealed_value: Option<u64>,
    pub committed_at: u64,
    pub revealed_at: Option<u64>,
}

impl Bid {
    pub fn is_revealed(&self) -> bool {
        self.revealed_value.is_some()
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Auction lifecycle phase. Transitions only move forward, one step at a time.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionPhase {
    /// Accepting commitments
    Open,
    /// Commitments locked, accepting reveals
    CommitClosed,
    /// Reveal window closed, values known
    Revealed,
    /// Winners and prices computed
    Closed,
    /// Results published, payments honored
    Settled,
}

impl AuctionPhase {
    /// The only phase this one may move to.
    pub fn successor(self) -> Option<AuctionPhase> {
        match self {
            AuctionPhase::Open => Some(AuctionPhase::CommitClosed),
            AuctionPhase::CommitClosed => Some(AuctionPhase::Revealed),
            AuctionPhase::Revealed => Some(AuctionPhase::Closed),
            AuctionPhase::Closed => Some(AuctionPhase::Settled),
            AuctionPhase::Settled => None,
        }
    }
}

/// Which flavour of the protocol an auction runs.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AuctionVariant {
    /// Raw values committed in the clear
    Plain,
    /// Commit-reveal keyed by the shared secret
    #[default]
    Sealed,
    /// Sealed, plus settlement addresses hidden until winners are known
    Mixer,
}

impl AuctionVariant {
    pub fn is_sealed(self) -> bool {
        !matches!(self, AuctionVariant::Plain)
    }
}

/// One allocated slot.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub bidder: Address,
    /// 1-based tier index
    pub tier: u32,
    pub value: u64,
    pub price: u64,
}

/// Result of closing an auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionOutcome {
    /// Winners in allocation order
    pub winners: Vec<WinnerRecord>,
    /// Committed bids that were never revealed
    pub forfeited: Vec<Address>,
    /// SHA-256 over all commitments in registry order
    pub commitments_digest: [u8; 32],
    pub closed_at: u64,
}

impl AuctionOutcome {
    pub fn winner_addresses(&self) -> Vec<Address> {
        self.winners.iter().map(|w| w.bidder).collect()
    }

    pub fn prices(&self) -> Vec<u64> {
        self.winners.iter().map(|w| w.price).collect()
    }
}

/// A payment obligation created when results are published.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SettlementSlot {
    pub payee: Address,
    pub price: u64,
    pub paid_at: Option<u64>,
}

impl SettlementSlot {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

// =========================
// ERROR CLASSIFICATION
// =========================

/// Coarse classification shared by every error type in the workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid identifiers, capacities or keys
    Configuration,
    /// Operation invoked outside its valid phase
    Phase,
    /// Conflicting answers, mismatched reveals or results
    Integrity,
    /// Repeated commit, reveal or payment
    Duplicate,
    /// Key exchange cannot converge because a participant stopped answering
    LivenessStall,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_successors_are_linear() {
        let mut phase = AuctionPhase::Open;
        let mut seen = vec![phase];
        while let Some(next) = phase.successor() {
            assert!(next > phase);
            seen.push(next);
            phase = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(phase, AuctionPhase::Settled);
    }

    #[test]
    fn test_g1_point_serialization() {
        let point = G1Point([42u8; 48]);
        let encoded = borsh::to_vec(&point).unwrap();
        let decoded: G1Point = borsh::from_slice(&encoded).unwrap();
        assert_eq!(point, decoded);

        let json = serde_json::to_string(&point).unwrap();
        let decoded: G1Point = serde_json::from_str(&json).unwrap();
        assert_eq!(point, decoded);
    }

    #[test]
    fn test_fingerprint_differs_per_key() {
        let a = SharedKey([1u8; 32]);
        let b = SharedKey([2u8; 32]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), SharedKey([1u8; 32]).fingerprint());
    }

    #[test]
    fn test_shared_key_debug_is_redacted() {
        let key = SharedKey([7u8; 32]);
        let printed = format!("{:?}", key);
        assert!(!printed.contains("7, 7"));
        assert!(printed.starts_with("SharedKey(fp="));
    }

    #[test]
    fn test_commitment_digest_bytes_are_tagged() {
        let plain = BidCommitment::Plain { value: 0 };
        let sealed = BidCommitment::Sealed { hash: [0u8; 32] };
        assert_ne!(plain.digest_bytes()[0], sealed.digest_bytes()[0]);
    }

    #[test]
    fn test_variant_deserializes_lowercase() {
        let v: AuctionVariant = serde_json::from_str("\"mixer\"").unwrap();
        assert_eq!(v, AuctionVariant::Mixer);
    }
}
